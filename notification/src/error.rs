//! Error types for the notification pipeline.
use std::error::Error as StdError;
use std::fmt;

/// Errors raised by the queue, the delivery history and the guardian lookup.
///
/// Gateway failures are not represented here: they are part of normal delivery
/// and are classified by [`crate::gateway::GatewayError`] instead.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: NotificationErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum NotificationErrorKind {
    // The job queue could not be reached or rejected the operation
    Queue,
    // Outcomes could not be persisted or read
    History,
    // Guardian devices could not be resolved or updated
    Directory,
    // A job could not be encoded or decoded
    Serialization,
}

impl Error {
    pub fn new(
        error_kind: NotificationErrorKind,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            source: Some(Box::new(source)),
            error_kind,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "Notification Error ({:?}): {}", self.error_kind, source),
            None => write!(f, "Notification Error ({:?})", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(NotificationErrorKind::Serialization, err)
    }
}
