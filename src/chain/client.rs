//!
//! Chain client interface consumed by the rescan orchestrator.

use super::types::{ChainError, RescanRequest, RescanStream};
use crate::wallet::WalletEngine;

use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Light-client chain backend.
///
/// Implementations have already validated headers and filters; the rescan pipeline only
/// consumes their results.
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
	/// Height of the best known block.
	async fn best_height(&self) -> Result<u32, ChainError>;

	/// Watch channel carrying `true` while the client is still catching up with the network.
	fn sync_state(&self) -> watch::Receiver<bool>;

	/// Whether the client is currently synchronizing to the network.
	fn synchronizing_to_network(&self) -> bool {
		*self.sync_state().borrow()
	}

	/// Start synchronizing `wallet` in the background.
	///
	/// The returned single-slot channel resolves once the background task finishes or fails.
	/// Dropping the receiver does not stop the task.
	fn synchronize(&self, wallet: Arc<dyn WalletEngine>) -> oneshot::Receiver<Result<(), ChainError>>;

	/// Start a filtered rescan.
	///
	/// Setting `quit` to `true` must end the rescan early.
	fn rescan(&self, request: RescanRequest, quit: watch::Receiver<bool>) -> RescanStream;
}
