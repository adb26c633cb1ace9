//! Guardian push notifications for recorded attendance.
//!
//! The [`Enqueuer`] turns each attendance event into one [`job::NotificationJob`]
//! per guardian device and appends it to a durable [`queue::JobQueue`].
//! [`DeliveryWorker`]s pull jobs independently, hand them to a
//! [`gateway::PushGateway`] and record every attempt in a
//! [`history::DeliveryHistory`]. Transient gateway failures are retried with
//! exponential backoff up to a ceiling; invalid device references fail at once.
//!
//! The queue, history, gateway and guardian lookup are traits so that storage
//! and provider implementations live in the `domain` crate and tests can use
//! the in-memory versions provided here.

pub mod enqueuer;
pub mod error;
pub mod gateway;
pub mod history;
pub mod job;
pub mod queue;
pub mod retry;
pub mod worker;

pub use enqueuer::{Enqueuer, GuardianDevice, GuardianDirectory};
pub use error::{Error, NotificationErrorKind};
pub use worker::{DeliveryWorker, WorkerPool};
