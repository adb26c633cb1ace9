use crate::error::Error;
use crate::job::NotificationJob;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

/// How long a popped job stays hidden from other consumers by default.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(60);

/// Durable FIFO of pending notification jobs with at-least-once hand-out.
///
/// `pop` leases the oldest ready job to exactly one caller. The job stays
/// queued but hidden until the lease runs out; the caller then either
/// `complete`s it or `reschedule`s it. A job whose lease expires without
/// either is handed out again.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Appends `job` to the tail. The job is not handed out before `not_before`.
    async fn push(&self, job: &NotificationJob, not_before: DateTime<Utc>) -> Result<(), Error>;

    /// Leases and returns the oldest ready job, waiting at most `wait` for one
    /// to become available.
    async fn pop(&self, wait: Duration) -> Result<Option<NotificationJob>, Error>;

    /// Replaces a leased job with `job` and releases it at `not_before`.
    async fn reschedule(&self, job: &NotificationJob, not_before: DateTime<Utc>)
        -> Result<(), Error>;

    /// Removes a job once it reached a terminal outcome. Unknown ids are ignored.
    async fn complete(&self, job_id: Uuid) -> Result<(), Error>;

    /// Number of queued jobs, ready, delayed or leased.
    async fn len(&self) -> Result<u64, Error>;
}

struct Entry {
    ready_at: Instant,
    job: NotificationJob,
}

/// Process-local queue used by tests and by deployments without a database.
pub struct InMemoryJobQueue {
    entries: Mutex<VecDeque<Entry>>,
    pushed: Notify,
    lease: Duration,
}

impl Default for InMemoryJobQueue {
    fn default() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            pushed: Notify::new(),
            lease: DEFAULT_LEASE,
        }
    }
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    fn ready_at(not_before: DateTime<Utc>) -> Instant {
        let delay = (not_before - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        Instant::now() + delay
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn push(&self, job: &NotificationJob, not_before: DateTime<Utc>) -> Result<(), Error> {
        self.entries.lock().await.push_back(Entry {
            ready_at: Self::ready_at(not_before),
            job: job.clone(),
        });
        self.pushed.notify_one();
        Ok(())
    }

    async fn pop(&self, wait: Duration) -> Result<Option<NotificationJob>, Error> {
        let deadline = Instant::now() + wait;

        loop {
            let next_ready_at = {
                let mut entries = self.entries.lock().await;
                let now = Instant::now();
                if let Some(entry) = entries.iter_mut().find(|e| e.ready_at <= now) {
                    entry.ready_at = now + self.lease;
                    return Ok(Some(entry.job.clone()));
                }
                entries.iter().map(|e| e.ready_at).min()
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }

            let wake_at = next_ready_at.map_or(deadline, |ready_at| ready_at.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, self.pushed.notified()).await;
        }
    }

    async fn reschedule(
        &self,
        job: &NotificationJob,
        not_before: DateTime<Utc>,
    ) -> Result<(), Error> {
        {
            let mut entries = self.entries.lock().await;
            entries.retain(|e| e.job.id != job.id);
            entries.push_back(Entry {
                ready_at: Self::ready_at(not_before),
                job: job.clone(),
            });
        }
        self.pushed.notify_one();
        Ok(())
    }

    async fn complete(&self, job_id: Uuid) -> Result<(), Error> {
        self.entries.lock().await.retain(|e| e.job.id != job_id);
        Ok(())
    }

    async fn len(&self) -> Result<u64, Error> {
        Ok(self.entries.lock().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn job(title: &str) -> NotificationJob {
        NotificationJob::new(1, "token", title, "body", BTreeMap::new())
    }

    #[tokio::test]
    async fn pops_in_fifo_order() {
        let queue = InMemoryJobQueue::new();
        queue.push(&job("first"), Utc::now()).await.unwrap();
        queue.push(&job("second"), Utc::now()).await.unwrap();

        assert_eq!(queue.len().await.unwrap(), 2);
        let first = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        let second = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(first.title, "first");
        assert_eq!(second.title, "second");
        assert!(queue.pop(Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_job_is_held_back_until_due() {
        let queue = InMemoryJobQueue::new();
        queue
            .push(&job("later"), Utc::now() + chrono::Duration::seconds(30))
            .await
            .unwrap();
        queue.push(&job("now"), Utc::now()).await.unwrap();

        let ready = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(ready.title, "now");
        assert!(queue.pop(Duration::from_secs(5)).await.unwrap().is_none());

        let later = queue.pop(Duration::from_secs(60)).await.unwrap().unwrap();
        assert_eq!(later.title, "later");
    }

    #[tokio::test]
    async fn waiting_pop_wakes_on_push() {
        let queue = std::sync::Arc::new(InMemoryJobQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop(Duration::from_secs(5)).await })
        };

        tokio::task::yield_now().await;
        queue.push(&job("wake"), Utc::now()).await.unwrap();

        let popped = consumer.await.unwrap().unwrap().unwrap();
        assert_eq!(popped.title, "wake");
    }

    #[tokio::test(start_paused = true)]
    async fn unfinished_job_is_handed_out_again_after_its_lease() {
        let queue = InMemoryJobQueue::new().with_lease(Duration::from_secs(30));
        queue.push(&job("leased"), Utc::now()).await.unwrap();

        let first = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        assert!(queue.pop(Duration::from_secs(10)).await.unwrap().is_none());
        assert_eq!(queue.len().await.unwrap(), 1);

        let again = queue.pop(Duration::from_secs(60)).await.unwrap().unwrap();
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn completed_job_leaves_the_queue() {
        let queue = InMemoryJobQueue::new();
        queue.push(&job("done"), Utc::now()).await.unwrap();

        let leased = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        queue.complete(leased.id).await.unwrap();

        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rescheduled_job_keeps_its_id_and_new_attempt() {
        let queue = InMemoryJobQueue::new();
        queue.push(&job("retry"), Utc::now()).await.unwrap();

        let mut leased = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        leased.attempt = 1;
        queue.reschedule(&leased, Utc::now()).await.unwrap();

        assert_eq!(queue.len().await.unwrap(), 1);
        let again = queue.pop(Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(again.id, leased.id);
        assert_eq!(again.attempt, 1);
    }
}
