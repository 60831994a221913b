//! Chain client boundary for the SPV rescan.
//!
//! The chain-sync engine (header storage, filter download, peer management) lives outside
//! this crate. This module defines the surface the rescan pipeline consumes from it: best
//! height, synchronization state, background wallet sync and the filtered rescan stream.

/// The `ChainClient` trait implemented by the light-client backend
mod client;
/// Request, notification and error types shared with the chain client
mod types;

pub use client::ChainClient;
pub use types::*;
