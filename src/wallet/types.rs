use crate::chain::ChainError;

use bitcoin::{Amount, Txid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A wallet transaction output as reported by the wallet engine's listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
	pub txid: Txid,
	pub vout: u32,
	/// Destination address of the output.
	pub address: String,
	pub amount: Amount,
	pub timestamp: DateTime<Utc>,
	/// Confirmed height, `None` while unconfirmed.
	pub block_height: Option<u32>,
}

/// Error reported by the wallet engine
#[derive(Debug, Clone, thiserror::Error)]
#[error("Wallet engine error: {0}")]
pub struct WalletEngineError(pub String);

/// Error types for the rescan cycle
#[derive(Debug, thiserror::Error)]
pub enum WalletSyncError {
	#[error("Precondition failed: {0}")]
	PreconditionFailed(String),

	#[error("Chain unavailable: {0}")]
	ChainUnavailable(#[source] ChainError),

	#[error("Invalid address {address}: {reason}")]
	InvalidAddress { address: String, reason: String },

	#[error("Rescan of {address} timed out after {}s", .elapsed.as_secs())]
	RescanTimeout { address: String, elapsed: Duration },

	#[error("Rescan cancelled")]
	Cancelled,

	#[error("Chain error: {0}")]
	Chain(#[from] ChainError),

	#[error("Balance unavailable: {0}")]
	BalanceUnavailable(#[source] WalletEngineError),

	#[error("Wallet engine error: {0}")]
	Wallet(#[from] WalletEngineError),

	#[error("Persistence error: {0}")]
	Persistence(String),
}
