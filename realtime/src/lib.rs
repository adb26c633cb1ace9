//! Live fan-out of attendance events to dashboards and public displays.
//!
//! # Architecture
//!
//! - **Single-owner registry**: the [`Hub`] keeps every live connection inside
//!   one task. Register, unregister and broadcast requests arrive over a channel
//!   and are applied in order, so the registry is never shared.
//! - **Bounded per-connection buffers**: a broadcast never waits on a consumer.
//!   A connection whose buffer is full is evicted and its socket closed.
//! - **Audience-specific views**: [`redaction::derive_view`] builds what each
//!   audience may see; public displays never receive identifiers.
//! - **Ephemeral messages**: a consumer that is offline misses the event and
//!   loads a fresh snapshot when it reconnects.
//!
//! # Message Flow
//!
//! 1. A client opens a WebSocket (dashboard token or display token)
//! 2. The web layer builds a [`connection::Connection`] and registers it
//! 3. The recording path publishes a `DomainEvent::AttendanceRecorded`
//! 4. The [`Broadcaster`] recomputes class and school stats, derives both views
//!    and submits one broadcast per audience and subscription scope
//! 5. The hub writes the serialized frame into every matching buffer
//!
//! # Modules
//!
//! - `connection`: connection ids, audiences, principals and broadcast filters
//! - `hub`: the registry task and its handle
//! - `message`: outbound wire messages, stats and leaderboard entries
//! - `redaction`: audience views
//! - `read_model`: queries the broadcaster needs from the attendance store
//! - `broadcaster`: the domain event handler

pub mod broadcaster;
pub mod connection;
pub mod hub;
pub mod message;
pub mod read_model;
pub mod redaction;

pub use broadcaster::Broadcaster;
pub use hub::Hub;
