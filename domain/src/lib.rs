//! Database- and provider-backed implementations of the relay's seams.
//!
//! The `realtime` and `notification` crates define what they need from the
//! outside world as traits. This crate implements those traits on top of
//! `entity_api` and third-party APIs, so that neither of them depends on the
//! database or on a push provider directly.

pub use entity_api::Id;

pub mod attendance;
pub mod delivery_history;
pub mod display_token;
pub mod error;
pub mod gateway;
pub mod guardian_directory;
pub mod internal_secret;
pub mod jwt;
pub mod notification_queue;

pub use attendance::PgAttendanceReadModel;
pub use delivery_history::PgDeliveryHistory;
pub use guardian_directory::PgGuardianDirectory;
pub use notification_queue::PgJobQueue;
