use crate::error::Error;
use crate::job::DeliveryOutcome;
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Append-only record of delivery attempts.
#[async_trait]
pub trait DeliveryHistory: Send + Sync {
    async fn record(&self, outcome: &DeliveryOutcome) -> Result<(), Error>;

    /// Outcomes of one job, oldest first.
    async fn outcomes_for(&self, job_id: Uuid) -> Result<Vec<DeliveryOutcome>, Error>;
}

#[derive(Default)]
pub struct InMemoryDeliveryHistory {
    outcomes: Mutex<Vec<DeliveryOutcome>>,
}

impl InMemoryDeliveryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<DeliveryOutcome> {
        self.outcomes.lock().await.clone()
    }
}

#[async_trait]
impl DeliveryHistory for InMemoryDeliveryHistory {
    async fn record(&self, outcome: &DeliveryOutcome) -> Result<(), Error> {
        self.outcomes.lock().await.push(outcome.clone());
        Ok(())
    }

    async fn outcomes_for(&self, job_id: Uuid) -> Result<Vec<DeliveryOutcome>, Error> {
        Ok(self
            .outcomes
            .lock()
            .await
            .iter()
            .filter(|o| o.job_id == job_id)
            .cloned()
            .collect())
    }
}
