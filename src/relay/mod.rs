//! Backend relay for derived wallet state.
//!
//! Records discovered by the rescan are queued durably and relayed to the backend over an
//! HMAC-signed HTTP channel. A record only leaves the queue once the backend has accepted
//! the batch that contained it, so relay failures are retried on the next cycle.

/// Signed HTTP client for the backend
mod client;
/// Unsent record queue and drain logic
mod queue;
/// Storage backends for queued records
mod repositories;
/// Records, payloads and errors
mod types;

pub use client::{BackendRelay, sign_payload};
pub use queue::{RelayEnqueueHandler, TransactionRelayQueue};
pub use repositories::{FileRelayRepository, MemoryRelayRepository, RelayRepository};
pub use types::*;
