use crate::message::{LeaderboardEntry, Stats};
use async_trait::async_trait;
use events::{AttendanceEvent, Id};
use std::error::Error as StdError;
use std::fmt;

/// Read-side queries against the authoritative attendance store.
///
/// All queries are scoped to the current calendar day of the school.
#[async_trait]
pub trait AttendanceReadModel: Send + Sync {
    /// Counters for one class, or for the whole school when `class_id` is `None`.
    async fn stats(&self, tenant_id: Id, class_id: Option<Id>) -> Result<Stats, ReadModelError>;

    /// Earliest on-time arrivals, at most `limit` entries, ranked from 1.
    async fn leaderboard(
        &self,
        tenant_id: Id,
        limit: u64,
    ) -> Result<Vec<LeaderboardEntry>, ReadModelError>;

    /// Most recent scans, newest first, as canonical events ready for redaction.
    async fn live_feed(
        &self,
        tenant_id: Id,
        class_id: Option<Id>,
        limit: u64,
    ) -> Result<Vec<AttendanceEvent>, ReadModelError>;
}

#[derive(Debug)]
pub struct ReadModelError {
    pub message: String,
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl ReadModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for ReadModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

impl StdError for ReadModelError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}
