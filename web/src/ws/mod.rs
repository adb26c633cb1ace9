//! WebSocket endpoints for live dashboards and public displays.
//!
//! The hub and broadcast machinery live in the `realtime` crate; this module
//! only admits sockets, bridges them to a hub connection and speaks the small
//! control protocol (`connected`, `ping`/`pong`, `subscribe`).

pub(crate) mod frame;
pub(crate) mod handler;
