//! Event system for the rescan cycle.
//!
//! The address rescanner reports what it finds as events instead of acting on matches
//! directly. Handlers registered with the `EventDispatcher` decide what to do with them:
//! logging, queueing records for the backend, collecting statistics. This keeps the scan
//! loop independent of where its results go.

use crate::wallet::WalletSyncError;
use crate::wallet::sync::transaction_processor::ResolvedAmounts;

use bitcoin::{Address, Amount, Txid};
use tracing::error;

/// A transaction that moved funds to or from a scanned address.
#[derive(Debug, Clone)]
pub struct TransactionMatch {
    pub txid: Txid,
    /// Height of the block that contained the transaction.
    pub block_height: u32,
    /// Block timestamp (unix seconds).
    pub block_time: u32,
    pub amounts: ResolvedAmounts,
    /// Outputs paying the scanned address, as `(vout, value)`.
    pub outputs: Vec<(u32, Amount)>,
}

/// Events that occur during a rescan cycle
pub enum SyncEvent {
    /// A block was connected while scanning `address`
    BlockConnected {
        address: Address,
        height: u32,
        transaction_count: usize,
    },
    /// A transaction in a connected block touched `address`
    TransactionMatched {
        address: Address,
        matched: TransactionMatch,
    },
    /// The rescan of one address finished
    AddressScanCompleted { address: Address, matches: usize },
    /// The rescan of one address failed and was skipped
    AddressScanFailed { address: String, error: String },
}

/// Trait for handling sync events.
///
/// Implementors receive every event dispatched during a cycle.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), WalletSyncError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
    /// Create a new, empty event dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a new event handler.
    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatch an event to all registered handlers.
    ///
    /// Errors from handlers are logged, but do not stop other handlers from running.
    pub async fn dispatch(&mut self, event: &SyncEvent) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }
}
