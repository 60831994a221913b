//! Rescan orchestrator and integration point for all sync services.
//!
//! This module defines the `RescanOrchestrator`, which drives one rescan cycle against the
//! chain client and the wallet engine:
//!
//! 1. Validate that both collaborators are present
//! 2. Kick off background wallet synchronization and wait briefly for it
//! 3. Enumerate the wallet's addresses
//! 4. Fetch the chain's best height
//! 5. Rescan every address sequentially from the checkpoint to the best height
//! 6. Wait for the chain client to finish synchronizing, bounded by the timeout policy
//! 7. Advance the checkpoint and read the post-rescan balance
//!
//! Failures of individual addresses are logged and skipped. Only missing collaborators, an
//! unreachable chain, cancellation and an unreadable balance end the cycle with an error.

use crate::chain::ChainClient;
use crate::config::RescanConfig;
use crate::utils::format_btc_amount;
use crate::wallet::sync::{
    events::{EventDispatcher, SyncEvent, SyncEventHandler},
    progress_tracker::{SyncProgressTracker, SyncStats},
    repositories::SyncCheckpoint,
    rescanner::{AddressRescanner, ScanContext},
    state_persistence::StatePersistenceService,
    timeout_policy::decide_timeout,
    transaction_processor::KnownTransactionCache,
};
use crate::wallet::{WalletEngine, WalletSyncError};

use bitcoin::{Amount, Network};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Result of a completed rescan cycle.
#[derive(Debug, Clone)]
pub struct RescanOutcome {
    /// Wallet balance read after the rescan.
    pub balance: Amount,
    pub stats: SyncStats,
    /// Checkpoint written at the end of the cycle, if the write succeeded.
    pub checkpoint: Option<SyncCheckpoint>,
}

/// Cooperative cancellation for rescan cycles.
///
/// Once triggered every in-flight address rescan aborts, and later cycles are refused.
#[derive(Clone)]
pub struct QuitSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl QuitSignal {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn quit(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_quit(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Coordinates a full rescan cycle.
pub struct RescanOrchestrator {
    wallet: Option<Arc<dyn WalletEngine>>,
    chain: Option<Arc<dyn ChainClient>>,
    rescanner: AddressRescanner,
    persistence_service: StatePersistenceService,
    event_dispatcher: EventDispatcher,
    config: RescanConfig,
    quit: QuitSignal,
}

impl RescanOrchestrator {
    /// Create an orchestrator without collaborators; attach them with `with_wallet` and
    /// `with_chain`.
    pub fn new(
        network: Network,
        config: RescanConfig,
        persistence_service: StatePersistenceService,
    ) -> Self {
        Self {
            wallet: None,
            chain: None,
            rescanner: AddressRescanner::new(network, config.clone()),
            persistence_service,
            event_dispatcher: EventDispatcher::new(),
            config,
            quit: QuitSignal::new(),
        }
    }

    pub fn with_wallet(mut self, wallet: Arc<dyn WalletEngine>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn with_chain(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Register a handler that receives every event of every cycle.
    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.event_dispatcher.register_handler(handler);
    }

    /// Handle for cancelling in-flight and future cycles.
    pub fn quit_signal(&self) -> QuitSignal {
        self.quit.clone()
    }

    /// Run one rescan cycle.
    pub async fn rescan(&mut self) -> Result<RescanOutcome, WalletSyncError> {
        let (Some(wallet), Some(chain)) = (self.wallet.clone(), self.chain.clone()) else {
            return Err(WalletSyncError::PreconditionFailed(
                "wallet engine and chain client are both required".to_string(),
            ));
        };

        if self.quit.is_quit() {
            return Err(WalletSyncError::Cancelled);
        }

        info!("Starting rescan cycle for wallet {}", wallet.name());

        self.initial_sync_wait(chain.as_ref(), wallet.clone()).await;

        let addresses = wallet.account_addresses(self.config.account).await?;
        let mut seen = HashSet::with_capacity(addresses.len());
        let addresses: Vec<String> = addresses
            .into_iter()
            .filter(|address| seen.insert(address.clone()))
            .collect();
        info!("Wallet has {} addresses to rescan", addresses.len());

        let best_height = chain
            .best_height()
            .await
            .map_err(WalletSyncError::ChainUnavailable)?;

        let checkpoint = match self.persistence_service.load_checkpoint().await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!("Failed to load checkpoint, rescanning from genesis: {}", e);
                SyncCheckpoint::default()
            }
        };
        let start_height = checkpoint.last_scanned_height.min(best_height);

        let stats = self
            .scan_addresses(chain.as_ref(), &addresses, start_height, best_height)
            .await?;

        self.full_sync_wait(chain.as_ref(), checkpoint.last_sync_time.as_deref())
            .await;

        let saved = match self
            .persistence_service
            .record_sync(&checkpoint, best_height, Utc::now())
            .await
        {
            Ok(saved) => Some(saved),
            Err(e) => {
                error!("Failed to save checkpoint: {}", e);
                None
            }
        };

        let balance = wallet
            .calculate_balance(self.config.min_confirmations)
            .await
            .map_err(WalletSyncError::BalanceUnavailable)?;

        info!("Rescan cycle completed: {}", stats.summary());
        info!("Wallet balance: {} BTC", format_btc_amount(balance.to_sat()));

        Ok(RescanOutcome {
            balance,
            stats,
            checkpoint: saved,
        })
    }

    /// Start background wallet sync and wait for it, at most `initial_sync_wait`.
    async fn initial_sync_wait(&self, chain: &dyn ChainClient, wallet: Arc<dyn WalletEngine>) {
        let result = chain.synchronize(wallet);
        match tokio::time::timeout(self.config.initial_sync_wait, result).await {
            Ok(Ok(Ok(()))) => info!("Initial wallet sync completed"),
            Ok(Ok(Err(e))) => warn!("Initial wallet sync reported an error: {}", e),
            Ok(Err(_)) => warn!("Wallet sync task ended without reporting a result"),
            Err(_) => info!(
                "Wallet sync still running after {:?}, continuing with rescan",
                self.config.initial_sync_wait
            ),
        }
    }

    /// Rescan every address in turn, sharing one transaction cache and quit signal.
    async fn scan_addresses(
        &mut self,
        chain: &dyn ChainClient,
        addresses: &[String],
        start_height: u32,
        end_height: u32,
    ) -> Result<SyncStats, WalletSyncError> {
        let quit = self.quit.subscribe();
        let mut cache = KnownTransactionCache::new();
        let mut progress = SyncProgressTracker::new(start_height);

        for address in addresses {
            if *quit.borrow() {
                return Err(WalletSyncError::Cancelled);
            }

            let mut ctx = ScanContext {
                cache: &mut cache,
                dispatcher: &mut self.event_dispatcher,
                progress: &mut progress,
            };
            let result = self
                .rescanner
                .scan(chain, address, start_height, end_height, quit.clone(), &mut ctx)
                .await;

            match result {
                Ok(_) => progress.record_address_scanned(),
                Err(WalletSyncError::Cancelled) => return Err(WalletSyncError::Cancelled),
                Err(e) => {
                    warn!("Skipping address {}: {}", address, e);
                    progress.record_address_failed();
                    self.event_dispatcher
                        .dispatch(&SyncEvent::AddressScanFailed {
                            address: address.clone(),
                            error: e.to_string(),
                        })
                        .await;
                }
            }
        }

        progress.log_progress(true);
        info!("Transaction cache holds {} transactions", cache.len());
        Ok(progress.get_stats())
    }

    /// Wait for the chain client to finish synchronizing, bounded by the timeout policy.
    async fn full_sync_wait(&self, chain: &dyn ChainClient, last_sync_time: Option<&str>) {
        let wait = decide_timeout(last_sync_time, Utc::now());
        let mut state = chain.sync_state();
        let synced = tokio::time::timeout(wait, async move {
            state.wait_for(|synchronizing| !*synchronizing).await.is_ok()
        })
        .await;

        match synced {
            Ok(true) => info!("Chain client synchronized"),
            Ok(false) => warn!("Chain sync state channel closed before sync completed"),
            Err(_) => warn!("Chain client still synchronizing after {:?}", wait),
        }
    }
}
