//!
//! Utility module for the wallet relay.
//!
//! Re-exports formatting helpers shared by the rescan and relay paths.
/// Amount and timestamp formatting
pub mod index;

pub use index::{BTC_DECIMALS, format_btc_amount, format_timestamp};
