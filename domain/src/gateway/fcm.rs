//! Firebase Cloud Messaging (HTTP v1) push gateway.
//!
//! One request delivers one message to one device registration. Access tokens
//! are obtained with the service-account JWT-bearer grant and cached until
//! shortly before they expire.

use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::*;
use notification::gateway::{DeliveryReceipt, GatewayError, PushGateway};
use notification::job::NotificationJob;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, Secret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use service::config::Config;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio::time::Instant;

const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Access tokens are refreshed this long before Google says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a Google service-account key file the gateway needs.
#[derive(Debug, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: SecretString,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Where the gateway gets its bearer token from.
pub enum Credentials {
    /// Exchange a signed assertion for an access token at `token_url`.
    ServiceAccount {
        account: ServiceAccount,
        token_url: String,
    },
    /// A fixed access token, e.g. one minted by the platform's metadata server.
    Static(SecretString),
}

// Credentials with the service-account key already parsed.
enum TokenSource {
    ServiceAccount {
        client_email: String,
        signing_key: EncodingKey,
        token_url: String,
    },
    Static(SecretString),
}

impl TokenSource {
    fn from_credentials(credentials: Credentials) -> Result<Self, Error> {
        match credentials {
            Credentials::Static(token) => Ok(TokenSource::Static(token)),
            Credentials::ServiceAccount { account, token_url } => {
                let signing_key =
                    EncodingKey::from_rsa_pem(account.private_key.expose_secret().as_bytes())
                        .map_err(|e| {
                            warn!(
                                "Service-account key of {} is not a valid RSA PEM key: {e}",
                                account.client_email
                            );
                            Error {
                                source: Some(Box::new(e)),
                                error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
                            }
                        })?;
                Ok(TokenSource::ServiceAccount {
                    client_email: account.client_email,
                    signing_key,
                    token_url,
                })
            }
        }
    }
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
struct SendResponse {
    name: Option<String>,
}

pub struct FcmGateway {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    token_source: TokenSource,
    cached_token: Mutex<Option<CachedToken>>,
}

impl FcmGateway {
    /// Fails with a config error when the service-account key cannot be parsed.
    pub fn new(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        credentials: Credentials,
    ) -> Result<Self, Error> {
        let token_source = TokenSource::from_credentials(credentials)?;
        let client = reqwest::Client::builder().use_rustls_tls().build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
            token_source,
            cached_token: Mutex::new(None),
        })
    }

    /// Builds the gateway from the service-account file named in the config.
    /// Returns `None` when push delivery is not configured.
    pub async fn from_config(config: &Config) -> Result<Option<Self>, Error> {
        let Some(path) = config.fcm_credentials_file() else {
            info!("FCM credentials not configured; push delivery is disabled");
            return Ok(None);
        };

        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            warn!("Failed to read FCM credentials file {path}: {e}");
            Error {
                source: Some(Box::new(e)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
            }
        })?;
        let account: ServiceAccount = serde_json::from_str(&raw).map_err(|e| {
            warn!("FCM credentials file {path} is not a service-account key: {e}");
            Error {
                source: Some(Box::new(e)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
            }
        })?;

        let project_id = config
            .fcm_project_id()
            .or_else(|| account.project_id.clone())
            .ok_or_else(|| {
                warn!("Failed to get FCM project id from config or credentials");
                Error::config()
            })?;

        info!("Push delivery enabled for FCM project {project_id}");

        Ok(Some(Self::new(
            config.fcm_base_url(),
            project_id,
            Credentials::ServiceAccount {
                account,
                token_url: config.fcm_token_url().to_string(),
            },
        )?))
    }

    async fn access_token(&self) -> Result<SecretString, GatewayError> {
        let (client_email, signing_key, token_url) = match &self.token_source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount {
                client_email,
                signing_key,
                token_url,
            } => (client_email, signing_key, token_url),
        };

        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.token.clone());
            }
        }

        let assertion = sign_assertion(client_email, signing_key, token_url)?;
        let response = self
            .client
            .post(token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("FCM token exchange failed: {status} - {body}");
            return Err(if status.is_server_error() {
                GatewayError::Unavailable(format!("token endpoint returned {status}"))
            } else {
                GatewayError::Authentication(format!("token endpoint returned {status}"))
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Authentication(format!("unreadable token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        let access_token: SecretString = Secret::new(token.access_token);
        *cached = Some(CachedToken {
            token: access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        debug!("Obtained FCM access token valid for {}s", lifetime.as_secs());

        Ok(access_token)
    }

    async fn forget_token(&self) {
        self.cached_token.lock().await.take();
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.base_url, self.project_id
        )
    }
}

#[async_trait]
impl PushGateway for FcmGateway {
    async fn send(&self, job: &NotificationJob) -> Result<DeliveryReceipt, GatewayError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(self.send_url())
            .bearer_auth(token.expose_secret())
            .json(&message_body(job))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .json::<SendResponse>()
                .await
                .ok()
                .and_then(|body| body.name);
            trace!("FCM accepted job {} as {:?}", job.id, message_id);
            return Ok(DeliveryReceipt { message_id });
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();

        let err = classify_failure(status, &body, retry_after);
        if matches!(err, GatewayError::Authentication(_)) {
            self.forget_token().await;
        }
        Err(err)
    }
}

fn sign_assertion(
    client_email: &str,
    signing_key: &EncodingKey,
    token_url: &str,
) -> Result<String, GatewayError> {
    let iat = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let claims = AssertionClaims {
        iss: client_email,
        scope: MESSAGING_SCOPE,
        aud: token_url,
        iat,
        exp: iat + 3600,
    };

    encode(&Header::new(Algorithm::RS256), &claims, signing_key)
        .map_err(|e| GatewayError::Authentication(format!("failed to sign assertion: {e}")))
}

/// The HTTP v1 request body for one job.
pub fn message_body(job: &NotificationJob) -> Value {
    let data: BTreeMap<&str, &str> = job
        .data
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    json!({
        "message": {
            "token": job.target_ref,
            "notification": {
                "title": job.title,
                "body": job.body,
            },
            "data": data,
            "android": {
                "priority": "high",
                "notification": { "sound": "default" },
            },
            "apns": {
                "payload": {
                    "aps": { "sound": "default", "badge": 1 },
                },
            },
        }
    })
}

/// Maps a non-success FCM response onto the gateway's failure classes.
pub fn classify_failure(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> GatewayError {
    let error_code = fcm_error_code(body);
    let detail = format!("{status} {}", error_code.as_deref().unwrap_or(""))
        .trim_end()
        .to_string();

    match error_code.as_deref() {
        Some("UNREGISTERED") | Some("INVALID_ARGUMENT") | Some("SENDER_ID_MISMATCH") => {
            return GatewayError::InvalidTarget(detail)
        }
        Some("QUOTA_EXCEEDED") => return GatewayError::RateLimited { retry_after },
        Some("UNAVAILABLE") | Some("INTERNAL") => return GatewayError::Unavailable(detail),
        _ => {}
    }

    match status {
        StatusCode::NOT_FOUND => GatewayError::InvalidTarget(detail),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Authentication(detail),
        s if s.is_server_error() => GatewayError::Unavailable(detail),
        _ => GatewayError::Rejected(detail),
    }
}

// FCM puts its own code in error.details[].errorCode; fall back to the RPC status.
fn fcm_error_code(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    error
        .get("details")
        .and_then(Value::as_array)
        .and_then(|details| {
            details
                .iter()
                .find_map(|d| d.get("errorCode").and_then(Value::as_str))
        })
        .or_else(|| error.get("status").and_then(Value::as_str))
        .map(str::to_string)
}

/// Accepts both forms of the header: delay seconds and an HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let at = httpdate::parse_http_date(value).ok()?;
    Some(at.duration_since(SystemTime::now()).unwrap_or_default())
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout(err.to_string())
    } else {
        GatewayError::Network(err.to_string())
    }
}
