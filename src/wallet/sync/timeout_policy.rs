//! How long to wait for the chain client to finish synchronizing.
//!
//! The wait shrinks as the last successful full sync gets fresher: a wallet that has never
//! synced gets a generous window, one that synced within the last few hours only needs a
//! short one.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

/// Wait used when no previous sync has been recorded.
pub const NO_PREVIOUS_SYNC_TIMEOUT: Duration = Duration::from_secs(3 * 60);
/// Wait used when the previous sync is stale or its timestamp cannot be read.
pub const STALE_SYNC_TIMEOUT: Duration = Duration::from_secs(60);
/// Wait used when the wallet synced recently.
pub const RECENT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);
/// Age beyond which a previous sync counts as stale.
pub const STALE_AFTER: Duration = Duration::from_secs(8 * 60 * 60);

/// Pick the full-sync wait from the last sync timestamp (RFC3339), evaluated at `now`.
pub fn decide_timeout(last_sync_time: Option<&str>, now: DateTime<Utc>) -> Duration {
	let Some(raw) = last_sync_time else {
		debug!("No previous sync recorded, waiting up to {:?}", NO_PREVIOUS_SYNC_TIMEOUT);
		return NO_PREVIOUS_SYNC_TIMEOUT;
	};

	let last_sync = match DateTime::parse_from_rfc3339(raw.trim()) {
		Ok(parsed) => parsed.with_timezone(&Utc),
		Err(e) => {
			warn!("Unparsable last sync time {:?}: {}", raw, e);
			return STALE_SYNC_TIMEOUT;
		}
	};

	let age_secs = now.signed_duration_since(last_sync).num_seconds();
	if age_secs > STALE_AFTER.as_secs() as i64 {
		debug!("Last sync at {} is older than 8h", last_sync);
		STALE_SYNC_TIMEOUT
	} else {
		RECENT_SYNC_TIMEOUT
	}
}
