//! SPV wallet rescan and backend relay.
//!
//! Reconciles a wallet's transaction history against the chain through a light-client
//! rescan, then relays the resulting wallet state to a backend over HMAC-signed requests.

pub mod chain;
pub mod config;
pub mod relay;
pub mod service;
pub mod utils;
pub mod wallet;
