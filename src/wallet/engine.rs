//! Wallet engine boundary.
//!
//! Key storage, address derivation and balance accounting belong to the wallet engine.
//! The rescan pipeline only reads from it.

use crate::wallet::types::{WalletEngineError, WalletTransaction};

use bitcoin::Amount;

#[async_trait::async_trait]
pub trait WalletEngine: Send + Sync {
	/// Name of the wallet, reported to the backend.
	fn name(&self) -> &str;

	/// Every address of `account`, in derivation order.
	async fn account_addresses(&self, account: u32) -> Result<Vec<String>, WalletEngineError>;

	/// Spendable balance counting outputs with at least `min_confirmations`.
	async fn calculate_balance(&self, min_confirmations: u32) -> Result<Amount, WalletEngineError>;

	/// Every transaction output the wallet knows about.
	async fn list_all_transactions(&self) -> Result<Vec<WalletTransaction>, WalletEngineError>;
}
