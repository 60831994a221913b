use crate::chain::{ChainClient, ConnectedBlock, RescanRequest};
use crate::config::RescanConfig;
use crate::utils::format_btc_amount;
use crate::wallet::WalletSyncError;
use crate::wallet::sync::events::{EventDispatcher, SyncEvent, TransactionMatch};
use crate::wallet::sync::progress_tracker::SyncProgressTracker;
use crate::wallet::sync::transaction_processor::{KnownTransactionCache, TransactionAmountResolver};

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, Network};
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

/// Mutable state shared by every address scanned in one cycle.
pub struct ScanContext<'a> {
	pub cache: &'a mut KnownTransactionCache,
	pub dispatcher: &'a mut EventDispatcher,
	pub progress: &'a mut SyncProgressTracker,
}

/// Runs a bounded, timed rescan of a single address.
pub struct AddressRescanner {
	resolver: TransactionAmountResolver,
	config: RescanConfig,
}

impl AddressRescanner {
	pub fn new(network: Network, config: RescanConfig) -> Self {
		Self {
			resolver: TransactionAmountResolver::new(network),
			config,
		}
	}

	/// Decode `address` against the configured network.
	pub fn decode_address(&self, address: &str) -> Result<Address, WalletSyncError> {
		let invalid = |reason: String| WalletSyncError::InvalidAddress {
			address: address.to_string(),
			reason,
		};
		address
			.parse::<Address<NetworkUnchecked>>()
			.map_err(|e| invalid(e.to_string()))?
			.require_network(self.resolver.network())
			.map_err(|e| invalid(e.to_string()))
	}

	/// Rescan `[start_height, end_height]` for `address`, returning the number of matching
	/// transactions.
	///
	/// Fails with `RescanTimeout` once the configured wall-clock ceiling elapses, and with
	/// `Cancelled` as soon as `quit` flips to `true`.
	pub async fn scan(
		&self,
		chain: &dyn ChainClient,
		address: &str,
		start_height: u32,
		end_height: u32,
		mut quit: watch::Receiver<bool>,
		ctx: &mut ScanContext<'_>,
	) -> Result<usize, WalletSyncError> {
		let target = self.decode_address(address)?;

		info!(
			"Rescanning {} from height {} to {}",
			target, start_height, end_height
		);

		let request = RescanRequest {
			start_height,
			end_height,
			watched_addresses: vec![target.clone()],
			retries: self.config.rescan_retries,
			query_timeout: self.config.query_timeout,
		};
		let mut blocks = chain.rescan(request, quit.clone());

		let started = Instant::now();
		let timeout = tokio::time::sleep_until(started + self.config.rescan_timeout);
		tokio::pin!(timeout);

		let mut matches = 0;

		loop {
			tokio::select! {
				biased;

				true = quit_requested(&mut quit) => {
					info!("Rescan of {} cancelled", target);
					return Err(WalletSyncError::Cancelled);
				}
				_ = &mut timeout => {
					return Err(WalletSyncError::RescanTimeout {
						address: address.to_string(),
						elapsed: started.elapsed(),
					});
				}
				next = blocks.next() => {
					match next {
						Some(Ok(block)) => {
							matches += self.handle_block(&target, &block, ctx).await;
							ctx.progress.log_progress(false);
						}
						Some(Err(e)) => return Err(e.into()),
						None => break,
					}
				}
			}
		}

		info!(
			"Rescan of {} finished: {} matching transactions",
			target, matches
		);

		ctx.dispatcher
			.dispatch(&SyncEvent::AddressScanCompleted {
				address: target,
				matches,
			})
			.await;

		Ok(matches)
	}

	async fn handle_block(
		&self,
		target: &Address,
		block: &ConnectedBlock,
		ctx: &mut ScanContext<'_>,
	) -> usize {
		debug!(
			"Block {} connected with {} transactions",
			block.height,
			block.transactions.len()
		);
		ctx.progress.record_block(block.height);
		ctx.dispatcher
			.dispatch(&SyncEvent::BlockConnected {
				address: target.clone(),
				height: block.height,
				transaction_count: block.transactions.len(),
			})
			.await;

		let mut found = 0;
		// Every transaction goes into the cache, relevant or not, so that later blocks can
		// resolve spends of its outputs.
		for tx in &block.transactions {
			let amounts = self.resolver.observe(tx, target, ctx.cache);
			if !amounts.is_relevant() {
				continue;
			}

			let txid = tx.compute_txid();
			info!(
				"Transaction {} at height {} for {}: received {} BTC, sent {} BTC",
				txid,
				block.height,
				target,
				format_btc_amount(amounts.received.to_sat()),
				format_btc_amount(amounts.sent.to_sat())
			);

			ctx.progress.record_match();
			ctx.dispatcher
				.dispatch(&SyncEvent::TransactionMatched {
					address: target.clone(),
					matched: TransactionMatch {
						txid,
						block_height: block.height,
						block_time: block.time,
						amounts,
						outputs: self.resolver.matching_outputs(tx, target),
					},
				})
				.await;
			found += 1;
		}
		found
	}
}

/// Resolves to `true` once quit is signalled, or `false` if the signal can no longer fire.
async fn quit_requested(quit: &mut watch::Receiver<bool>) -> bool {
	quit.wait_for(|quit| *quit).await.is_ok()
}
