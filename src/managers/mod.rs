// Managers Module
//
// Shared process-wide state owned by the relay:
// - ClientRegistry: connected stream clients and the fan-out to them

pub mod client_registry;

pub use client_registry::{BroadcastReport, ClientId, ClientRegistry, Payload};
