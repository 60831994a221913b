//! Wallet Rescan Module
//!
//! This module reconciles the wallet's view of its transactions with the chain by running an
//! SPV rescan over every wallet address. It is composed of several submodules:
//!
//! - `orchestrator`: Drives one rescan cycle and wires all other services together.
//! - `rescanner`: Bounded, timed rescan of a single address.
//! - `transaction_processor`: Resolves received/sent amounts using the per-cycle transaction cache.
//! - `timeout_policy`: Chooses how long to wait for the chain client to finish syncing.
//! - `events`: Events emitted during a cycle and the handlers that consume them.
//! - `progress_tracker`: Per-cycle statistics.
//! - `repositories` / `state_persistence`: Sync checkpoint storage.

/// Event system for decoupled handling of rescan results
pub mod events;
/// Main coordinator for the rescan cycle
pub mod orchestrator;
/// Tracks rescan progress and statistics
pub mod progress_tracker;
/// Checkpoint storage backends
pub mod repositories;
/// Single-address rescan
pub mod rescanner;
/// Checkpoint read/advance rules
pub mod state_persistence;
/// Full-sync wait policy
pub mod timeout_policy;
/// Transaction cache and amount resolution
pub mod transaction_processor;

pub use orchestrator::*;
