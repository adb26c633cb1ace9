use domain::error::{AuthErrorKind, DomainErrorKind, Error as DomainError};
use events::Id;
use serde::{Deserialize, Serialize};

/// Control frames a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ClientFrame {
    Ping,
    Subscribe {
        #[serde(default)]
        payload: SubscribePayload,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct SubscribePayload {
    /// `None` follows the whole school.
    #[serde(default)]
    pub(crate) class_id: Option<Id>,
}

/// Control frames the server sends besides broadcast messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ServerFrame {
    Connected {
        school_id: Id,
        audience: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        class_id: Option<Id>,
    },
    Pong,
    Subscribed {
        class_id: Option<Id>,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl ServerFrame {
    pub(crate) fn error(code: ErrorCode) -> Self {
        ServerFrame::Error {
            code,
            message: code.message().to_string(),
        }
    }

    pub(crate) fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from(r#"{"type":"error"}"#))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum ErrorCode {
    AuthTokenMissing,
    AuthTokenInvalid,
    AuthzTenantRequired,
    DisplayTokenInvalid,
    UnsupportedMessage,
    InternalError,
}

impl ErrorCode {
    fn message(&self) -> &'static str {
        match self {
            ErrorCode::AuthTokenMissing => "Authentication token is required",
            ErrorCode::AuthTokenInvalid => "Authentication token is invalid or expired",
            ErrorCode::AuthzTenantRequired => "Token is not bound to a school",
            ErrorCode::DisplayTokenInvalid => "Display token is invalid, revoked or expired",
            ErrorCode::UnsupportedMessage => "Message type is not supported on this connection",
            ErrorCode::InternalError => "Connection could not be established",
        }
    }

    /// The code a refused connection reports for a domain error.
    pub(crate) fn for_error(err: &DomainError) -> Self {
        match &err.error_kind {
            DomainErrorKind::Auth(AuthErrorKind::TenantRequired) => ErrorCode::AuthzTenantRequired,
            DomainErrorKind::Auth(AuthErrorKind::InvalidDisplayToken) => {
                ErrorCode::DisplayTokenInvalid
            }
            DomainErrorKind::Auth(_) => ErrorCode::AuthTokenInvalid,
            _ => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn client_frames_parse() {
        assert_eq!(
            serde_json::from_str::<ClientFrame>(r#"{"type":"ping"}"#).unwrap(),
            ClientFrame::Ping
        );
        assert_eq!(
            serde_json::from_str::<ClientFrame>(r#"{"type":"subscribe","payload":{"class_id":7}}"#)
                .unwrap(),
            ClientFrame::Subscribe {
                payload: SubscribePayload { class_id: Some(7) }
            }
        );
        assert_eq!(
            serde_json::from_str::<ClientFrame>(r#"{"type":"subscribe"}"#).unwrap(),
            ClientFrame::Subscribe {
                payload: SubscribePayload { class_id: None }
            }
        );
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn error_frame_carries_code_and_message() {
        let frame: Value =
            serde_json::from_str(&ServerFrame::error(ErrorCode::AuthzTenantRequired).to_json())
                .unwrap();

        assert_eq!(frame["type"], "error");
        assert_eq!(frame["code"], "AUTHZ_TENANT_REQUIRED");
        assert!(frame["message"].is_string());
    }

    #[test]
    fn connected_frame_shape() {
        let frame: Value = serde_json::from_str(
            &ServerFrame::Connected {
                school_id: 1,
                audience: "dashboard".to_string(),
                class_id: Some(7),
            }
            .to_json(),
        )
        .unwrap();

        assert_eq!(
            frame,
            json!({"type": "connected", "school_id": 1, "audience": "dashboard", "class_id": 7})
        );
    }

    #[test]
    fn domain_errors_map_to_codes() {
        let err = DomainError {
            source: None,
            error_kind: DomainErrorKind::Auth(AuthErrorKind::InvalidDisplayToken),
        };
        assert_eq!(ErrorCode::for_error(&err), ErrorCode::DisplayTokenInvalid);
    }
}
