//! Event system infrastructure for the attendance relay.
//!
//! The attendance-recording path produces one canonical [`AttendanceEvent`] per
//! check-in or check-out and hands it to an [`EventPublisher`]. Every registered
//! [`EventHandler`] (live broadcasting, guardian notification) receives the same
//! immutable event.
//!
//! # Architecture
//!
//! - **DomainEvent**: Enum representing all business events the relay reacts to
//! - **EventHandler**: Trait for implementing event handlers
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! This crate has no dependencies on internal crates (entity, domain, etc.),
//! avoiding circular dependencies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A type alias that represents the integer primary keys of the school records
/// (schools, students, classes, users, display tokens).
pub type Id = i64;

/// Attendance status as assigned by the recording path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    OnTime,
    Late,
    VeryLate,
    Absent,
    Sick,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::OnTime => "on_time",
            AttendanceStatus::Late => "late",
            AttendanceStatus::VeryLate => "very_late",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Sick => "sick",
            AttendanceStatus::Excused => "excused",
        }
    }

    /// Whether the student was physically present, regardless of punctuality.
    pub fn is_attended(&self) -> bool {
        matches!(
            self,
            AttendanceStatus::OnTime | AttendanceStatus::Late | AttendanceStatus::VeryLate
        )
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct AttendanceStatusParseError(pub String);

impl fmt::Display for AttendanceStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown attendance status: {}", self.0)
    }
}

impl std::error::Error for AttendanceStatusParseError {}

impl FromStr for AttendanceStatus {
    type Err = AttendanceStatusParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "on_time" => Ok(AttendanceStatus::OnTime),
            "late" => Ok(AttendanceStatus::Late),
            "very_late" => Ok(AttendanceStatus::VeryLate),
            "absent" => Ok(AttendanceStatus::Absent),
            "sick" => Ok(AttendanceStatus::Sick),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(AttendanceStatusParseError(other.to_string())),
        }
    }
}

/// Direction of the recorded scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CheckIn,
    CheckOut,
}

/// Canonical record produced once per check-in or check-out.
///
/// Carries the display names resolved by the recording path so that consumers
/// do not need a second lookup. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// The school (tenant) the student belongs to.
    pub tenant_id: Id,
    pub student_id: Id,
    pub student_name: String,
    /// National student identifier. Only authenticated consumers may ever see it.
    #[serde(default)]
    pub national_student_id: Option<String>,
    #[serde(default)]
    pub class_id: Option<Id>,
    #[serde(default)]
    pub class_name: Option<String>,
    /// Time of the scan: check-in time for check-ins, check-out time otherwise.
    pub timestamp: DateTime<Utc>,
    pub status: AttendanceStatus,
    pub kind: EventKind,
}

/// Domain events that represent business-level changes the relay reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A check-in or check-out was recorded. Triggers a live broadcast and a
    /// guardian notification.
    AttendanceRecorded(AttendanceEvent),
    /// An attendance row was deleted or corrected, so aggregate statistics
    /// changed without a new scan.
    AttendanceRemoved {
        tenant_id: Id,
        #[serde(default)]
        class_id: Option<Id>,
    },
    /// A public-display token was revoked; terminals using it must be dropped.
    DisplayTokenRevoked { tenant_id: Id, display_token_id: Id },
}

impl DomainEvent {
    pub fn tenant_id(&self) -> Id {
        match self {
            DomainEvent::AttendanceRecorded(event) => event.tenant_id,
            DomainEvent::AttendanceRemoved { tenant_id, .. } => *tenant_id,
            DomainEvent::DisplayTokenRevoked { tenant_id, .. } => *tenant_id,
        }
    }
}

/// Trait for handling domain events.
/// Implementations perform side effects like broadcasting to live consumers or
/// queueing notifications. They must not fail the publisher: errors are handled
/// (logged) inside the handler.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &DomainEvent);
}

/// Publishes domain events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: DomainEvent) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
