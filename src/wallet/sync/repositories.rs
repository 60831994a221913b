use crate::wallet::WalletSyncError;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::info;

/// Process-wide rescan state: where the next cycle starts and when the last one finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
	/// Last block height known to have been scanned.
	pub last_scanned_height: u32,
	/// RFC3339 timestamp of the last successful full sync, kept as written.
	pub last_sync_time: Option<String>,
}

/// Repository for checkpoint persistence
#[async_trait::async_trait]
pub trait CheckpointRepository: Send + Sync {
	async fn save(&self, checkpoint: &SyncCheckpoint) -> Result<(), WalletSyncError>;
	async fn load(&self) -> Result<Option<SyncCheckpoint>, WalletSyncError>;
}

/// File-based implementation of CheckpointRepository
pub struct FileCheckpointRepository {
	data_dir: PathBuf,
}

impl FileCheckpointRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn get_checkpoint_filename(&self) -> PathBuf {
		self.data_dir.join("sync_checkpoint.json")
	}
}

#[async_trait::async_trait]
impl CheckpointRepository for FileCheckpointRepository {
	async fn save(&self, checkpoint: &SyncCheckpoint) -> Result<(), WalletSyncError> {
		tokio::fs::create_dir_all(&self.data_dir).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to create data directory: {}", e))
		})?;

		let content = serde_json::to_string_pretty(checkpoint).map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to serialize checkpoint: {}", e))
		})?;

		let filename = self.get_checkpoint_filename();
		let tmp = filename.with_extension("json.tmp");
		tokio::fs::write(&tmp, content).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to write checkpoint file: {}", e))
		})?;
		tokio::fs::rename(&tmp, &filename).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to replace checkpoint file: {}", e))
		})?;

		info!(
			"Saved checkpoint to {:?} at height {}",
			filename, checkpoint.last_scanned_height
		);
		Ok(())
	}

	async fn load(&self) -> Result<Option<SyncCheckpoint>, WalletSyncError> {
		let filename = self.get_checkpoint_filename();
		let exists = tokio::fs::try_exists(&filename).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to check checkpoint file: {}", e))
		})?;
		if !exists {
			return Ok(None);
		}

		let content = tokio::fs::read_to_string(&filename).await.map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to read checkpoint file: {}", e))
		})?;

		let checkpoint: SyncCheckpoint = serde_json::from_str(&content).map_err(|e| {
			WalletSyncError::Persistence(format!("Failed to parse checkpoint file: {}", e))
		})?;

		info!(
			"Loaded checkpoint from {:?} at height {}",
			filename, checkpoint.last_scanned_height
		);
		Ok(Some(checkpoint))
	}
}

/// In-memory implementation of CheckpointRepository
#[derive(Default)]
pub struct MemoryCheckpointRepository {
	checkpoint: Mutex<Option<SyncCheckpoint>>,
}

impl MemoryCheckpointRepository {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_checkpoint(checkpoint: SyncCheckpoint) -> Self {
		Self {
			checkpoint: Mutex::new(Some(checkpoint)),
		}
	}
}

#[async_trait::async_trait]
impl CheckpointRepository for MemoryCheckpointRepository {
	async fn save(&self, checkpoint: &SyncCheckpoint) -> Result<(), WalletSyncError> {
		*self.checkpoint.lock().await = Some(checkpoint.clone());
		Ok(())
	}

	async fn load(&self) -> Result<Option<SyncCheckpoint>, WalletSyncError> {
		Ok(self.checkpoint.lock().await.clone())
	}
}
