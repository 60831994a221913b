//! Types exchanged with the chain client during a rescan

use bitcoin::{Address, Transaction};
use futures_util::Stream;
use std::pin::Pin;
use std::time::Duration;

/// Parameters of one filtered rescan.
#[derive(Debug, Clone)]
pub struct RescanRequest {
    /// First block height to scan (inclusive).
    pub start_height: u32,
    /// Last block height to scan (inclusive).
    pub end_height: u32,
    /// Addresses whose filter matches should be reported.
    pub watched_addresses: Vec<Address>,
    /// Retry budget for filter and block queries.
    pub retries: u32,
    /// Timeout for each individual query to peers.
    pub query_timeout: Duration,
}

/// A block connected during a rescan, carrying the transactions that matched the
/// watched set.
#[derive(Debug, Clone)]
pub struct ConnectedBlock {
    /// Block height.
    pub height: u32,
    /// Block header timestamp (unix seconds).
    pub time: u32,
    /// Transactions in block order.
    pub transactions: Vec<Transaction>,
}

/// Stream of block-connected notifications for one rescan. The stream ends when the
/// rescan reaches `end_height`; an `Err` item means the rescan itself failed.
pub type RescanStream = Pin<Box<dyn Stream<Item = Result<ConnectedBlock, ChainError>> + Send>>;

/// Error types reported by the chain client
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    #[error("Chain backend unavailable: {0}")]
    Unavailable(String),

    #[error("Rescan failed: {0}")]
    RescanFailed(String),

    #[error("Wallet synchronization failed: {0}")]
    SyncFailed(String),
}
