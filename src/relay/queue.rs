//! Idempotent relay queue.
//!
//! Records are enqueued locally first and drained to the backend in batches. A batch is
//! marked sent only after the backend answered 200, and only the records that were in that
//! batch are marked; records enqueued while a send is in flight stay queued for the next
//! drain. Drains are serialized so two concurrent callers never post the same batch.

use super::client::BackendRelay;
use super::repositories::RelayRepository;
use super::types::{
	ADDRESSES_ENDPOINT, AddressPayload, BALANCE_ENDPOINT, BalancePayload, ReceiveAddressRecord,
	RecordKey, RelayError, TRANSACTIONS_ENDPOINT, TransactionPayload, TransactionRecord,
};
use crate::utils::format_btc_amount;
use crate::wallet::WalletSyncError;
use crate::wallet::sync::events::{SyncEvent, SyncEventHandler};

use bitcoin::Amount;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Queue of records waiting to be relayed to the backend for one wallet.
pub struct TransactionRelayQueue {
	repo: Arc<dyn RelayRepository>,
	relay: BackendRelay,
	wallet_name: String,
	/// Serializes drains.
	lock: Mutex<()>,
}

impl TransactionRelayQueue {
	pub fn new(repo: Arc<dyn RelayRepository>, relay: BackendRelay, wallet_name: &str) -> Self {
		Self {
			repo,
			relay,
			wallet_name: wallet_name.to_string(),
			lock: Mutex::new(()),
		}
	}

	pub fn wallet_name(&self) -> &str {
		&self.wallet_name
	}

	/// Queue a transaction record. Returns `false` if `(txid, vout)` was already queued.
	pub async fn enqueue_transaction(&self, record: &TransactionRecord) -> Result<bool, RelayError> {
		self.repo.save_transaction(record).await
	}

	/// Queue a receive address. Returns `false` if the address was already queued.
	pub async fn enqueue_receive_address(
		&self,
		record: &ReceiveAddressRecord,
	) -> Result<bool, RelayError> {
		self.repo.save_receive_address(record).await
	}

	/// Post every unsent transaction record in one batch.
	///
	/// Returns the number of records relayed. On any error nothing is marked sent.
	pub async fn send_unsent_transactions(&self) -> Result<usize, RelayError> {
		let _guard = self.lock.lock().await;

		let unsent = self.repo.unsent_transactions(&self.wallet_name).await?;
		if unsent.is_empty() {
			debug!("No unsent transactions for wallet {}", self.wallet_name);
			return Ok(0);
		}

		let payloads: Vec<TransactionPayload> = unsent.iter().map(TransactionPayload::from).collect();
		self.relay.send(TRANSACTIONS_ENDPOINT, &payloads).await?;

		let keys: Vec<RecordKey> = unsent.iter().map(TransactionRecord::key).collect();
		let marked = self.repo.mark_transactions_sent(&keys).await?;
		info!("Relayed {} transactions, marked {} sent", unsent.len(), marked);
		Ok(unsent.len())
	}

	/// Post every unsent receive address in one batch.
	pub async fn send_unsent_addresses(&self) -> Result<usize, RelayError> {
		let _guard = self.lock.lock().await;

		let unsent = self.repo.unsent_addresses(&self.wallet_name).await?;
		if unsent.is_empty() {
			debug!("No unsent addresses for wallet {}", self.wallet_name);
			return Ok(0);
		}

		let payloads: Vec<AddressPayload> = unsent.iter().map(AddressPayload::from).collect();
		self.relay.send(ADDRESSES_ENDPOINT, &payloads).await?;

		let addresses: Vec<String> = unsent.iter().map(|record| record.address.clone()).collect();
		let marked = self.repo.mark_addresses_sent(&addresses).await?;
		info!("Relayed {} addresses, marked {} sent", unsent.len(), marked);
		Ok(unsent.len())
	}

	/// Report the wallet balance. Nothing is queued for a balance.
	pub async fn send_balance(&self, balance: Amount) -> Result<(), RelayError> {
		let payload = BalancePayload {
			wallet_name: self.wallet_name.clone(),
			balance: format_btc_amount(balance.to_sat()),
		};
		self.relay.send(BALANCE_ENDPOINT, &payload).await?;
		info!("Relayed balance {} BTC", payload.balance);
		Ok(())
	}
}

/// Event handler that queues every matched output for relay.
pub struct RelayEnqueueHandler {
	queue: Arc<TransactionRelayQueue>,
}

impl RelayEnqueueHandler {
	pub fn new(queue: Arc<TransactionRelayQueue>) -> Self {
		Self { queue }
	}
}

#[async_trait::async_trait]
impl SyncEventHandler for RelayEnqueueHandler {
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError> {
		let SyncEvent::TransactionMatched { address, matched } = event else {
			return Ok(());
		};

		let timestamp = DateTime::<Utc>::from_timestamp(i64::from(matched.block_time), 0)
			.unwrap_or_else(Utc::now);
		let address = address.to_string();

		for (vout, value) in &matched.outputs {
			let record = TransactionRecord::new(
				self.queue.wallet_name(),
				matched.txid,
				*vout,
				&address,
				*value,
				timestamp,
				Some(matched.block_height),
			);
			let inserted = self
				.queue
				.enqueue_transaction(&record)
				.await
				.map_err(|e| WalletSyncError::Persistence(e.to_string()))?;
			if !inserted {
				warn!("Output {} already queued", record.output);
			}
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"RelayEnqueueHandler"
	}
}
