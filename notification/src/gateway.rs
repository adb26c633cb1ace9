//! Push delivery gateway abstraction.

use crate::job::NotificationJob;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Successful hand-off to the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReceipt {
    /// Provider-assigned message id, when the provider returns one.
    pub message_id: Option<String>,
}

/// Provider-agnostic delivery failures.
///
/// Implementations map their native responses onto these variants;
/// [`GatewayError::is_transient`] decides whether the worker retries.
#[derive(Debug)]
pub enum GatewayError {
    /// The device reference is unknown, unregistered or malformed. Retrying
    /// can never succeed.
    InvalidTarget(String),

    /// The provider refused the message itself (payload too large, bad field).
    Rejected(String),

    /// Provider rate limit exceeded. `retry_after` carries the server hint.
    RateLimited { retry_after: Option<Duration> },

    /// Provider-side outage or 5xx response.
    Unavailable(String),

    /// Network connectivity issues, DNS failures or connection resets.
    Network(String),

    /// The call did not complete within the delivery timeout.
    Timeout(String),

    /// Credentials were refused. Usually an expired access token.
    Authentication(String),

    /// No provider is configured for this deployment.
    NotConfigured,
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited { .. }
                | GatewayError::Unavailable(_)
                | GatewayError::Network(_)
                | GatewayError::Timeout(_)
                | GatewayError::Authentication(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GatewayError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::InvalidTarget(msg) => write!(f, "Invalid target: {}", msg),
            GatewayError::Rejected(msg) => write!(f, "Rejected by provider: {}", msg),
            GatewayError::RateLimited {
                retry_after: Some(delay),
            } => write!(f, "Rate limited: retry after {}s", delay.as_secs()),
            GatewayError::RateLimited { retry_after: None } => write!(f, "Rate limited"),
            GatewayError::Unavailable(msg) => write!(f, "Provider unavailable: {}", msg),
            GatewayError::Network(msg) => write!(f, "Network error: {}", msg),
            GatewayError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            GatewayError::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            GatewayError::NotConfigured => write!(f, "Push delivery is not configured"),
        }
    }
}

impl std::error::Error for GatewayError {}

/// Delivers one job to one device.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, job: &NotificationJob) -> Result<DeliveryReceipt, GatewayError>;
}

/// Gateway used when no provider credentials are configured. Every job fails
/// permanently so the history shows why nothing was delivered.
pub struct DisabledGateway;

#[async_trait]
impl PushGateway for DisabledGateway {
    async fn send(&self, _job: &NotificationJob) -> Result<DeliveryReceipt, GatewayError> {
        Err(GatewayError::NotConfigured)
    }
}
