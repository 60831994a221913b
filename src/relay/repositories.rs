use super::types::{ReceiveAddressRecord, RecordKey, RelayError, TransactionRecord};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Durable store for records waiting to be relayed.
///
/// Saving is idempotent: a transaction record is keyed by `(txid, vout)` and an address
/// record by its address string. Marking sent only ever flips the flag for the given keys.
#[async_trait::async_trait]
pub trait RelayRepository: Send + Sync {
	/// Save a transaction record. Returns `false` if it was already present.
	async fn save_transaction(&self, record: &TransactionRecord) -> Result<bool, RelayError>;
	async fn unsent_transactions(
		&self,
		wallet_name: &str,
	) -> Result<Vec<TransactionRecord>, RelayError>;
	/// Mark exactly `keys` as sent. Returns how many records changed.
	async fn mark_transactions_sent(&self, keys: &[RecordKey]) -> Result<usize, RelayError>;

	/// Save an address record. Returns `false` if the address was already present.
	async fn save_receive_address(&self, record: &ReceiveAddressRecord)
	-> Result<bool, RelayError>;
	async fn unsent_addresses(
		&self,
		wallet_name: &str,
	) -> Result<Vec<ReceiveAddressRecord>, RelayError>;
	/// Mark exactly `addresses` as sent. Returns how many records changed.
	async fn mark_addresses_sent(&self, addresses: &[String]) -> Result<usize, RelayError>;
}

/// Contents of one relay queue.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct QueueState {
	transactions: Vec<TransactionRecord>,
	addresses: Vec<ReceiveAddressRecord>,
}

impl QueueState {
	fn save_transaction(&mut self, record: &TransactionRecord) -> bool {
		let key = record.key();
		if self.transactions.iter().any(|existing| existing.key() == key) {
			return false;
		}
		self.transactions.push(record.clone());
		true
	}

	fn unsent_transactions(&self, wallet_name: &str) -> Vec<TransactionRecord> {
		self.transactions
			.iter()
			.filter(|record| !record.sent && record.wallet_name == wallet_name)
			.cloned()
			.collect()
	}

	fn mark_transactions_sent(&mut self, keys: &[RecordKey]) -> usize {
		let keys: HashSet<&RecordKey> = keys.iter().collect();
		let mut changed = 0;
		for record in &mut self.transactions {
			if !record.sent && keys.contains(&record.key()) {
				record.sent = true;
				changed += 1;
			}
		}
		changed
	}

	fn save_receive_address(&mut self, record: &ReceiveAddressRecord) -> bool {
		if self
			.addresses
			.iter()
			.any(|existing| existing.address == record.address)
		{
			return false;
		}
		self.addresses.push(record.clone());
		true
	}

	fn unsent_addresses(&self, wallet_name: &str) -> Vec<ReceiveAddressRecord> {
		let mut unsent: Vec<ReceiveAddressRecord> = self
			.addresses
			.iter()
			.filter(|record| !record.sent && record.wallet_name == wallet_name)
			.cloned()
			.collect();
		unsent.sort_by_key(|record| record.index);
		unsent
	}

	fn mark_addresses_sent(&mut self, addresses: &[String]) -> usize {
		let addresses: HashSet<&str> = addresses.iter().map(String::as_str).collect();
		let mut changed = 0;
		for record in &mut self.addresses {
			if !record.sent && addresses.contains(record.address.as_str()) {
				record.sent = true;
				changed += 1;
			}
		}
		changed
	}
}

/// `relay_queue_<wallet>.json`, with every byte outside `[A-Za-z0-9_-]` written as `%XX`.
fn queue_file_name(wallet_name: &str) -> String {
	let mut escaped = String::with_capacity(wallet_name.len());
	for byte in wallet_name.bytes() {
		if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
			escaped.push(byte as char);
		} else {
			escaped.push_str(&format!("%{:02X}", byte));
		}
	}
	format!("relay_queue_{}.json", escaped)
}

/// File-based implementation of RelayRepository.
///
/// The whole queue lives in one JSON file; every operation is a read-modify-write under an
/// in-process lock.
pub struct FileRelayRepository {
	path: PathBuf,
	lock: Mutex<()>,
}

impl FileRelayRepository {
	/// Queue file for `wallet_name` inside `data_dir`. The wallet name is escaped so it can
	/// never leave `data_dir`.
	pub fn new(data_dir: PathBuf, wallet_name: &str) -> Self {
		Self {
			path: data_dir.join(queue_file_name(wallet_name)),
			lock: Mutex::new(()),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn read_state(&self) -> Result<QueueState, RelayError> {
		let exists = tokio::fs::try_exists(&self.path).await.map_err(|e| {
			RelayError::Storage(format!("Failed to check relay queue {:?}: {}", self.path, e))
		})?;
		if !exists {
			return Ok(QueueState::default());
		}

		let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
			RelayError::Storage(format!("Failed to read relay queue {:?}: {}", self.path, e))
		})?;

		serde_json::from_str(&content).map_err(|e| {
			RelayError::Storage(format!("Failed to parse relay queue {:?}: {}", self.path, e))
		})
	}

	async fn write_state(&self, state: &QueueState) -> Result<(), RelayError> {
		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await.map_err(|e| {
				RelayError::Storage(format!("Failed to create data directory: {}", e))
			})?;
		}

		let content = serde_json::to_string_pretty(state)?;

		// Write to a sibling file first so a crash never leaves a truncated queue behind.
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, content).await.map_err(|e| {
			RelayError::Storage(format!("Failed to write relay queue {:?}: {}", tmp, e))
		})?;
		tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
			RelayError::Storage(format!("Failed to replace relay queue {:?}: {}", self.path, e))
		})?;

		debug!(
			"Relay queue written: {} transactions, {} addresses",
			state.transactions.len(),
			state.addresses.len()
		);
		Ok(())
	}

	async fn modify<R>(&self, f: impl FnOnce(&mut QueueState) -> R) -> Result<R, RelayError> {
		let _guard = self.lock.lock().await;
		let mut state = self.read_state().await?;
		let result = f(&mut state);
		self.write_state(&state).await?;
		Ok(result)
	}

	async fn read<R>(&self, f: impl FnOnce(&QueueState) -> R) -> Result<R, RelayError> {
		let _guard = self.lock.lock().await;
		let state = self.read_state().await?;
		Ok(f(&state))
	}
}

#[async_trait::async_trait]
impl RelayRepository for FileRelayRepository {
	async fn save_transaction(&self, record: &TransactionRecord) -> Result<bool, RelayError> {
		let inserted = self.modify(|state| state.save_transaction(record)).await?;
		if inserted {
			info!("Queued transaction {} for relay", record.output);
		}
		Ok(inserted)
	}

	async fn unsent_transactions(
		&self,
		wallet_name: &str,
	) -> Result<Vec<TransactionRecord>, RelayError> {
		self.read(|state| state.unsent_transactions(wallet_name)).await
	}

	async fn mark_transactions_sent(&self, keys: &[RecordKey]) -> Result<usize, RelayError> {
		self.modify(|state| state.mark_transactions_sent(keys)).await
	}

	async fn save_receive_address(
		&self,
		record: &ReceiveAddressRecord,
	) -> Result<bool, RelayError> {
		self.modify(|state| state.save_receive_address(record)).await
	}

	async fn unsent_addresses(
		&self,
		wallet_name: &str,
	) -> Result<Vec<ReceiveAddressRecord>, RelayError> {
		self.read(|state| state.unsent_addresses(wallet_name)).await
	}

	async fn mark_addresses_sent(&self, addresses: &[String]) -> Result<usize, RelayError> {
		self.modify(|state| state.mark_addresses_sent(addresses)).await
	}
}

/// In-memory implementation of RelayRepository
#[derive(Default)]
pub struct MemoryRelayRepository {
	state: Mutex<QueueState>,
}

impl MemoryRelayRepository {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of transaction records held, sent or not.
	pub async fn transaction_count(&self) -> usize {
		self.state.lock().await.transactions.len()
	}
}

#[async_trait::async_trait]
impl RelayRepository for MemoryRelayRepository {
	async fn save_transaction(&self, record: &TransactionRecord) -> Result<bool, RelayError> {
		Ok(self.state.lock().await.save_transaction(record))
	}

	async fn unsent_transactions(
		&self,
		wallet_name: &str,
	) -> Result<Vec<TransactionRecord>, RelayError> {
		Ok(self.state.lock().await.unsent_transactions(wallet_name))
	}

	async fn mark_transactions_sent(&self, keys: &[RecordKey]) -> Result<usize, RelayError> {
		Ok(self.state.lock().await.mark_transactions_sent(keys))
	}

	async fn save_receive_address(
		&self,
		record: &ReceiveAddressRecord,
	) -> Result<bool, RelayError> {
		Ok(self.state.lock().await.save_receive_address(record))
	}

	async fn unsent_addresses(
		&self,
		wallet_name: &str,
	) -> Result<Vec<ReceiveAddressRecord>, RelayError> {
		Ok(self.state.lock().await.unsent_addresses(wallet_name))
	}

	async fn mark_addresses_sent(&self, addresses: &[String]) -> Result<usize, RelayError> {
		Ok(self.state.lock().await.mark_addresses_sent(addresses))
	}
}
