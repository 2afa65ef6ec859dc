//! Signaling relay for two-party WebRTC calls.
//!
//! Browsers connect to `/ws`, declare themselves `sender` or `receiver`, and
//! are paired with an unpaired peer of the opposite role. Offer, answer and
//! ICE candidate payloads are then forwarded to the partner untouched.

pub mod config;
pub mod connection;
pub mod debug_client;
pub mod error;
pub mod lifecycle;
pub mod pairing;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod server;
pub mod telemetry;
pub mod websocket;

pub use connection::{ConnectionId, Role};
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::Registry;
pub use server::{router, serve, AppState};
