//! Wallet sync service.
//!
//! Runs one full cycle for a wallet: announce receive addresses, rescan, queue everything
//! the wallet knows about, then (when this node owns relay duties) drain the queue to the
//! backend and report the balance.

use crate::chain::ChainClient;
use crate::config::{RelayConfig, RescanConfig};
use crate::relay::{ReceiveAddressRecord, RelayEnqueueHandler, TransactionRecord, TransactionRelayQueue};
use crate::wallet::sync::state_persistence::StatePersistenceService;
use crate::wallet::sync::{QuitSignal, RescanOrchestrator, RescanOutcome};
use crate::wallet::{WalletEngine, WalletSyncError};

use std::sync::Arc;
use tracing::{error, info, warn};

/// What one cycle accomplished.
#[derive(Debug, Clone)]
pub struct CycleReport {
	pub outcome: RescanOutcome,
	/// Newly queued transaction records from the wallet listing.
	pub transactions_queued: usize,
	/// Newly queued receive addresses.
	pub addresses_queued: usize,
	/// Transactions accepted by the backend, `None` if relaying is off or the send failed.
	pub transactions_relayed: Option<usize>,
	pub addresses_relayed: Option<usize>,
	pub balance_relayed: bool,
}

pub struct WalletSyncService {
	wallet: Arc<dyn WalletEngine>,
	orchestrator: RescanOrchestrator,
	queue: Arc<TransactionRelayQueue>,
	relay_enabled: bool,
	account: u32,
}

impl WalletSyncService {
	/// Build the service and wire rescan matches into the relay queue.
	pub fn new(
		relay_config: &RelayConfig,
		rescan_config: RescanConfig,
		persistence_service: StatePersistenceService,
		wallet: Arc<dyn WalletEngine>,
		chain: Arc<dyn ChainClient>,
		queue: Arc<TransactionRelayQueue>,
	) -> Self {
		let account = rescan_config.account;
		let mut orchestrator =
			RescanOrchestrator::new(relay_config.network, rescan_config, persistence_service)
				.with_wallet(wallet.clone())
				.with_chain(chain);
		orchestrator.register_handler(Box::new(RelayEnqueueHandler::new(queue.clone())));

		Self {
			wallet,
			orchestrator,
			queue,
			relay_enabled: relay_config.relay_enabled,
			account,
		}
	}

	pub fn quit_signal(&self) -> QuitSignal {
		self.orchestrator.quit_signal()
	}

	/// Run one cycle. Only rescan failures end it early; queue and relay errors are logged.
	pub async fn run_cycle(&mut self) -> Result<CycleReport, WalletSyncError> {
		let addresses_queued = self.enqueue_receive_addresses().await;

		let outcome = self.orchestrator.rescan().await?;

		let transactions_queued = self.enqueue_listed_transactions().await;

		let mut report = CycleReport {
			outcome,
			transactions_queued,
			addresses_queued,
			transactions_relayed: None,
			addresses_relayed: None,
			balance_relayed: false,
		};

		if !self.relay_enabled {
			info!("Relay disabled, leaving records queued");
			return Ok(report);
		}

		match self.queue.send_unsent_transactions().await {
			Ok(count) => report.transactions_relayed = Some(count),
			Err(e) => error!("Failed to relay transactions, keeping them queued: {}", e),
		}

		match self.queue.send_balance(report.outcome.balance).await {
			Ok(()) => report.balance_relayed = true,
			Err(e) => error!("Failed to relay balance: {}", e),
		}

		match self.queue.send_unsent_addresses().await {
			Ok(count) => report.addresses_relayed = Some(count),
			Err(e) => error!("Failed to relay addresses, keeping them queued: {}", e),
		}

		Ok(report)
	}

	async fn enqueue_receive_addresses(&self) -> usize {
		let addresses = match self.wallet.account_addresses(self.account).await {
			Ok(addresses) => addresses,
			Err(e) => {
				warn!("Could not list receive addresses: {}", e);
				return 0;
			}
		};

		let mut queued = 0;
		for (index, address) in addresses.iter().enumerate() {
			let record =
				ReceiveAddressRecord::new(self.queue.wallet_name(), index as u32, address);
			match self.queue.enqueue_receive_address(&record).await {
				Ok(true) => queued += 1,
				Ok(false) => {}
				Err(e) => warn!("Failed to queue address {}: {}", address, e),
			}
		}
		info!("Queued {} new receive addresses", queued);
		queued
	}

	async fn enqueue_listed_transactions(&self) -> usize {
		let transactions = match self.wallet.list_all_transactions().await {
			Ok(transactions) => transactions,
			Err(e) => {
				warn!("Could not list wallet transactions: {}", e);
				return 0;
			}
		};

		let mut queued = 0;
		for tx in &transactions {
			let record = TransactionRecord::new(
				self.queue.wallet_name(),
				tx.txid,
				tx.vout,
				&tx.address,
				tx.amount,
				tx.timestamp,
				tx.block_height,
			);
			match self.queue.enqueue_transaction(&record).await {
				Ok(true) => queued += 1,
				Ok(false) => {}
				Err(e) => warn!("Failed to queue transaction {}: {}", record.output, e),
			}
		}
		info!(
			"Wallet lists {} transactions, {} newly queued",
			transactions.len(),
			queued
		);
		queued
	}
}
