use crate::enqueuer::GuardianDirectory;
use crate::error::Error;
use crate::gateway::{GatewayError, PushGateway};
use crate::history::DeliveryHistory;
use crate::job::{DeliveryOutcome, DeliveryResult, NotificationJob};
use crate::queue::JobQueue;
use crate::retry::RetryPolicy;
use chrono::Utc;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(5);
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Pulls jobs from the queue and drives each one to a recorded outcome.
///
/// Per job: `Pending -> Delivering -> Delivered | RetryScheduled | FailedPermanent`.
/// A retry is rescheduled with a later `not_before`, so other jobs are not
/// held up while it waits. A job leaves the queue only after its terminal
/// outcome is recorded.
#[derive(Clone)]
pub struct DeliveryWorker {
    queue: Arc<dyn JobQueue>,
    gateway: Arc<dyn PushGateway>,
    history: Arc<dyn DeliveryHistory>,
    directory: Option<Arc<dyn GuardianDirectory>>,
    policy: RetryPolicy,
    poll_wait: Duration,
    delivery_timeout: Duration,
}

impl DeliveryWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        gateway: Arc<dyn PushGateway>,
        history: Arc<dyn DeliveryHistory>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            gateway,
            history,
            directory: None,
            policy,
            poll_wait: DEFAULT_POLL_WAIT,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    /// Deactivate device references the gateway reports as invalid.
    pub fn with_directory(mut self, directory: Arc<dyn GuardianDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_poll_wait(mut self, poll_wait: Duration) -> Self {
        self.poll_wait = poll_wait;
        self
    }

    pub fn with_delivery_timeout(mut self, delivery_timeout: Duration) -> Self {
        self.delivery_timeout = delivery_timeout;
        self
    }

    /// Runs until `shutdown` is cancelled. A delivery already in progress is
    /// allowed to finish (bounded by the delivery timeout) before returning.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("Delivery worker started");

        loop {
            let popped = tokio::select! {
                _ = shutdown.cancelled() => break,
                popped = self.queue.pop(self.poll_wait) => popped,
            };

            match popped {
                Ok(Some(job)) => {
                    if let Err(e) = self.deliver(job).await {
                        error!("Failed to finish notification job: {e}");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to read from notification queue: {e}");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_wait) => {}
                    }
                }
            }
        }

        info!("Delivery worker stopped");
    }

    /// Processes at most one job, waiting up to `wait` for it.
    pub async fn process_next(&self, wait: Duration) -> Result<Option<DeliveryOutcome>, Error> {
        match self.queue.pop(wait).await? {
            Some(job) => self.deliver(job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Processes up to `max` jobs that are ready now, without waiting.
    /// Returns the number processed.
    pub async fn process_pending(&self, max: usize) -> Result<usize, Error> {
        let mut processed = 0;
        while processed < max {
            if self.process_next(Duration::ZERO).await?.is_none() {
                break;
            }
            processed += 1;
        }
        Ok(processed)
    }

    pub async fn queue_length(&self) -> Result<u64, Error> {
        self.queue.len().await
    }

    /// Makes one delivery attempt for `job`, records its outcome and settles
    /// the job in the queue.
    pub async fn deliver(&self, job: NotificationJob) -> Result<DeliveryOutcome, Error> {
        let attempt = job.attempt + 1;
        debug!(
            "Delivering notification {} (attempt {}/{})",
            job.id,
            attempt,
            self.policy.ceiling()
        );

        let sent = match tokio::time::timeout(self.delivery_timeout, self.gateway.send(&job)).await {
            Ok(sent) => sent,
            Err(_) => Err(GatewayError::Timeout(format!(
                "no response within {}s",
                self.delivery_timeout.as_secs()
            ))),
        };

        let outcome = match sent {
            Ok(receipt) => {
                info!("Delivered notification {} on attempt {attempt}", job.id);
                DeliveryOutcome::for_job(&job, DeliveryResult::Delivered, attempt, receipt.message_id)
            }
            Err(e) if e.is_transient() && self.policy.should_retry(attempt) => {
                self.schedule_retry(&job, attempt, &e).await
            }
            Err(e) => {
                warn!(
                    "Notification {} failed permanently on attempt {attempt}: {e}",
                    job.id
                );
                if matches!(e, GatewayError::InvalidTarget(_)) {
                    self.deactivate_target(&job.target_ref).await;
                }
                DeliveryOutcome::for_job(
                    &job,
                    DeliveryResult::FailedPermanent,
                    attempt,
                    Some(e.to_string()),
                )
            }
        };

        self.history.record(&outcome).await?;
        if outcome.result.is_terminal() {
            self.queue.complete(job.id).await?;
        }
        Ok(outcome)
    }

    async fn schedule_retry(
        &self,
        job: &NotificationJob,
        attempt: u32,
        cause: &GatewayError,
    ) -> DeliveryOutcome {
        let delay = self.policy.delay_for(attempt, cause.retry_after());
        let not_before = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

        let mut retry = job.clone();
        retry.attempt = attempt;

        match self.queue.reschedule(&retry, not_before).await {
            Ok(()) => {
                info!(
                    "Notification {} attempt {attempt} failed ({cause}); retrying in {}ms",
                    job.id,
                    delay.as_millis()
                );
                DeliveryOutcome::for_job(
                    job,
                    DeliveryResult::RetryScheduled,
                    attempt,
                    Some(cause.to_string()),
                )
            }
            Err(e) => {
                error!("Failed to reschedule notification {}: {e}", job.id);
                DeliveryOutcome::for_job(
                    job,
                    DeliveryResult::FailedPermanent,
                    attempt,
                    Some(format!("{cause}; reschedule failed: {e}")),
                )
            }
        }
    }

    async fn deactivate_target(&self, target_ref: &str) {
        if let Some(directory) = &self.directory {
            if let Err(e) = directory.deactivate_target(target_ref).await {
                warn!("Failed to deactivate invalid device reference: {e}");
            }
        }
    }
}

/// A set of workers sharing one queue and one shutdown signal.
pub struct WorkerPool {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn spawn(worker: DeliveryWorker, count: usize) -> Self {
        let shutdown = CancellationToken::new();
        let handles = (0..count.max(1))
            .map(|_| {
                let worker = worker.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { worker.run(shutdown).await })
            })
            .collect::<Vec<_>>();

        info!("Started {} delivery worker(s)", handles.len());
        Self { shutdown, handles }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops dequeuing and waits for in-flight deliveries to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Delivery worker terminated abnormally: {e}");
            }
        }
    }
}
