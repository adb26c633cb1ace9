//! Clients for third-party delivery providers.

pub mod fcm;
