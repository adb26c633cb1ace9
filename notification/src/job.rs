use chrono::{DateTime, Utc};
use events::Id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unit of push work for one guardian device.
///
/// This is the serialized form stored in the queue. `attempt` counts the
/// delivery attempts already made; a fresh job starts at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationJob {
    pub id: Uuid,
    pub recipient_user_id: Id,
    /// Device registration token understood by the push gateway.
    pub target_ref: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
}

impl NotificationJob {
    pub fn new(
        recipient_user_id: Id,
        target_ref: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        data: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_user_id,
            target_ref: target_ref.into(),
            title: title.into(),
            body: body.into(),
            data,
            attempt: 0,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryResult {
    Delivered,
    RetryScheduled,
    FailedPermanent,
}

impl DeliveryResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryResult::Delivered => "delivered",
            DeliveryResult::RetryScheduled => "retry_scheduled",
            DeliveryResult::FailedPermanent => "failed_permanent",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryResult::RetryScheduled)
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryResult {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "delivered" => Ok(DeliveryResult::Delivered),
            "retry_scheduled" => Ok(DeliveryResult::RetryScheduled),
            "failed_permanent" => Ok(DeliveryResult::FailedPermanent),
            other => Err(format!("unknown delivery result: {other}")),
        }
    }
}

/// One entry of the delivery history. Every attempt produces exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub job_id: Uuid,
    pub recipient_user_id: Id,
    pub target_ref: String,
    pub recorded_at: DateTime<Utc>,
    pub result: DeliveryResult,
    pub attempt: u32,
    /// Gateway message id on success, failure reason otherwise.
    pub detail: Option<String>,
}

impl DeliveryOutcome {
    pub fn for_job(
        job: &NotificationJob,
        result: DeliveryResult,
        attempt: u32,
        detail: Option<String>,
    ) -> Self {
        Self {
            job_id: job.id,
            recipient_user_id: job.recipient_user_id,
            target_ref: job.target_ref.clone(),
            recorded_at: Utc::now(),
            result,
            attempt,
            detail,
        }
    }
}
