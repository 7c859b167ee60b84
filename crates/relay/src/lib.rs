//! Relay transport for the job log multiplexer: a WebSocket client that
//! implements `ControlTransport` and the `joblog-tail` viewer built on it.

pub mod client;
pub mod config;
pub mod link;

pub use client::{spawn_relay_client, RelayError};
pub use config::{RelayClientConfig, RELAY_URL_ENV};
pub use link::RelayLink;
