//! State persistence service for the rescan cycle.
//!
//! Wraps a `CheckpointRepository` and owns the rules for reading and advancing the
//! checkpoint: a missing checkpoint starts from genesis, and the height never moves
//! backwards.

use crate::utils::format_timestamp;
use crate::wallet::WalletSyncError;
use crate::wallet::sync::repositories::{
    CheckpointRepository, FileCheckpointRepository, SyncCheckpoint,
};

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Service for reading and advancing the sync checkpoint.
#[derive(Clone)]
pub struct StatePersistenceService {
    checkpoint_repo: Arc<dyn CheckpointRepository>,
}

impl StatePersistenceService {
    /// Create a service backed by a checkpoint file in `data_dir`.
    pub fn new(data_dir: PathBuf) -> Self {
        Self::with_repository(Arc::new(FileCheckpointRepository::new(data_dir)))
    }

    pub fn with_repository(checkpoint_repo: Arc<dyn CheckpointRepository>) -> Self {
        Self { checkpoint_repo }
    }

    /// Load the checkpoint, or the genesis checkpoint if none was saved yet.
    pub async fn load_checkpoint(&self) -> Result<SyncCheckpoint, WalletSyncError> {
        match self.checkpoint_repo.load().await? {
            Some(checkpoint) => Ok(checkpoint),
            None => {
                info!("No checkpoint found, starting from genesis");
                Ok(SyncCheckpoint::default())
            }
        }
    }

    /// Record a completed cycle on top of `previous`: stamp `now` as the last sync time and
    /// advance the scanned height to `scanned_height`.
    pub async fn record_sync(
        &self,
        previous: &SyncCheckpoint,
        scanned_height: u32,
        now: DateTime<Utc>,
    ) -> Result<SyncCheckpoint, WalletSyncError> {
        let checkpoint = SyncCheckpoint {
            last_scanned_height: previous.last_scanned_height.max(scanned_height),
            last_sync_time: Some(format_timestamp(now)),
        };
        self.checkpoint_repo.save(&checkpoint).await?;
        Ok(checkpoint)
    }
}
