//! Progress tracking for a rescan cycle.
//!
//! Counts addresses scanned and skipped, blocks connected and transactions matched so the
//! orchestrator can report one summary line per cycle.

use std::collections::HashSet;
use tracing::info;

/// Tracks the progress of one rescan cycle
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
    /// Height the cycle started scanning from
    start_height: u32,
    /// Highest block height seen across all addresses
    highest_height: u32,
    /// Distinct block heights connected during the cycle
    connected_heights: HashSet<u32>,
    addresses_scanned: usize,
    addresses_failed: usize,
    transactions_matched: usize,
    /// Block count at which progress was last logged
    last_logged_blocks: usize,
}

impl SyncProgressTracker {
    /// Create a new progress tracker starting from the given height.
    pub fn new(start_height: u32) -> Self {
        Self {
            start_height,
            highest_height: start_height,
            connected_heights: HashSet::new(),
            addresses_scanned: 0,
            addresses_failed: 0,
            transactions_matched: 0,
            last_logged_blocks: 0,
        }
    }

    pub fn record_block(&mut self, height: u32) {
        self.highest_height = self.highest_height.max(height);
        self.connected_heights.insert(height);
    }

    pub fn record_match(&mut self) {
        self.transactions_matched += 1;
    }

    pub fn record_address_scanned(&mut self) {
        self.addresses_scanned += 1;
    }

    pub fn record_address_failed(&mut self) {
        self.addresses_failed += 1;
    }

    /// Log progress every 1000 connected blocks, or when forced
    pub fn log_progress(&mut self, force: bool) {
        let blocks = self.connected_heights.len();
        if force || blocks.saturating_sub(self.last_logged_blocks) >= 1000 {
            info!(
                "Rescan progress: {} blocks connected up to height {}, {} matching transactions",
                blocks, self.highest_height, self.transactions_matched
            );
            self.last_logged_blocks = blocks;
        }
    }

    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            start_height: self.start_height,
            highest_height: self.highest_height,
            blocks_connected: self.connected_heights.len(),
            addresses_scanned: self.addresses_scanned,
            addresses_failed: self.addresses_failed,
            transactions_matched: self.transactions_matched,
        }
    }
}

/// Statistics about a rescan cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub start_height: u32,
    pub highest_height: u32,
    pub blocks_connected: usize,
    pub addresses_scanned: usize,
    pub addresses_failed: usize,
    pub transactions_matched: usize,
}

impl SyncStats {
    /// Get a human-readable summary of the cycle
    pub fn summary(&self) -> String {
        format!(
            "Rescan from {} to {}: {} addresses scanned{}, {} blocks, {} matching transactions",
            self.start_height,
            self.highest_height,
            self.addresses_scanned,
            if self.addresses_failed == 0 {
                String::new()
            } else {
                format!(" ({} failed)", self.addresses_failed)
            },
            self.blocks_connected,
            self.transactions_matched
        )
    }
}
