//! Stream server: WebSocket fan-out endpoint plus a health route.
//!
//! The router is built here; listeners are bound by [`crate::relay::Relay`].

mod routes;
mod ws;

pub use routes::{build_router, HealthResponse, RelayHttpState};
