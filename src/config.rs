//! Relay and rescan configuration.
//!
//! Values are read once at the edge of the program and handed to the services at
//! construction. Nothing below this module reads the process environment.

use bitcoin::Network;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Default backend base URL when `BACKEND_URL` is unset.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:9002";

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("Missing required setting: {0}")]
	Missing(&'static str),

	#[error("Invalid value for {key}: {value}")]
	Invalid { key: &'static str, value: String },
}

/// Backend relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
	/// Backend base URL, without a trailing slash.
	pub backend_url: String,
	/// Shared secret used both as the `X-API-Key` header and the HMAC key.
	pub api_key: String,
	/// Wallet name reported in every payload.
	pub wallet_name: String,
	/// Whether this node owns relay duties.
	pub relay_enabled: bool,
	/// Long-running mode: drain on an interval instead of once.
	pub server_mode: bool,
	/// Directory holding the checkpoint and relay queue files.
	pub data_dir: PathBuf,
	/// Network used to decode addresses.
	pub network: Network,
	/// Delay between relay cycles in server mode.
	pub relay_interval: Duration,
}

impl RelayConfig {
	/// Load configuration from the environment, after reading an optional `.env` file.
	///
	/// Environment variables:
	/// - `BACKEND_URL`: backend base URL (default `http://localhost:9002`)
	/// - `BACKEND_API_KEY`: API key, required when `RELAY_ENABLED=true`
	/// - `WALLET_NAME`: wallet name (default `default`)
	/// - `RELAY_ENABLED`: `true` if this node relays wallet state
	/// - `SERVER_MODE`: `true` to keep relaying on an interval
	/// - `DATA_DIR`: state directory (default `./data`)
	/// - `BITCOIN_NETWORK`: `bitcoin`, `testnet`, `signet` or `regtest` (default)
	/// - `RELAY_INTERVAL_SECS`: seconds between relay cycles (default 60)
	pub fn from_env() -> Result<Self, ConfigError> {
		if dotenv::dotenv().is_ok() {
			info!("Loaded settings from .env");
		}
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Build the configuration from an arbitrary key lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let backend_url = lookup("BACKEND_URL")
			.filter(|url| !url.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string())
			.trim_end_matches('/')
			.to_string();

		let relay_enabled = parse_flag(&lookup, "RELAY_ENABLED")?;
		let server_mode = parse_flag(&lookup, "SERVER_MODE")?;

		let api_key = lookup("BACKEND_API_KEY").unwrap_or_default();
		if relay_enabled && api_key.is_empty() {
			return Err(ConfigError::Missing("BACKEND_API_KEY"));
		}

		let wallet_name = lookup("WALLET_NAME")
			.filter(|name| !name.is_empty())
			.unwrap_or_else(|| "default".to_string());

		let data_dir = lookup("DATA_DIR")
			.map(PathBuf::from)
			.unwrap_or_else(|| PathBuf::from("./data"));

		let network = match lookup("BITCOIN_NETWORK")
			.unwrap_or_else(|| "regtest".to_string())
			.to_lowercase()
			.as_str()
		{
			"bitcoin" | "mainnet" => Network::Bitcoin,
			"testnet" => Network::Testnet,
			"signet" => Network::Signet,
			"regtest" | "" => Network::Regtest,
			other => {
				return Err(ConfigError::Invalid {
					key: "BITCOIN_NETWORK",
					value: other.to_string(),
				});
			}
		};

		let relay_interval = match lookup("RELAY_INTERVAL_SECS") {
			Some(raw) => {
				let secs = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
					key: "RELAY_INTERVAL_SECS",
					value: raw.clone(),
				})?;
				Duration::from_secs(secs.max(1))
			}
			None => Duration::from_secs(60),
		};

		if !relay_enabled {
			warn!("Relay duties disabled for wallet {}", wallet_name);
		}

		Ok(Self {
			backend_url,
			api_key,
			wallet_name,
			relay_enabled,
			server_mode,
			data_dir,
			network,
			relay_interval,
		})
	}
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> Result<bool, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	match lookup(key) {
		None => Ok(false),
		Some(raw) => match raw.to_lowercase().as_str() {
			"1" | "true" | "yes" | "on" => Ok(true),
			"0" | "false" | "no" | "off" | "" => Ok(false),
			_ => Err(ConfigError::Invalid { key, value: raw }),
		},
	}
}

/// Timing and scope parameters for one rescan cycle.
#[derive(Debug, Clone)]
pub struct RescanConfig {
	/// Upper bound on the initial wallet synchronization wait.
	pub initial_sync_wait: Duration,
	/// Wall-clock ceiling for a single address rescan.
	pub rescan_timeout: Duration,
	/// Retry budget handed to the chain client for each rescan.
	pub rescan_retries: u32,
	/// Per-query timeout handed to the chain client.
	pub query_timeout: Duration,
	/// Wallet account whose addresses are scanned.
	pub account: u32,
	/// Minimum confirmations for the post-rescan balance.
	pub min_confirmations: u32,
}

impl Default for RescanConfig {
	fn default() -> Self {
		Self {
			initial_sync_wait: Duration::from_secs(5),
			rescan_timeout: Duration::from_secs(30 * 60),
			rescan_retries: 10,
			query_timeout: Duration::from_secs(20 * 60),
			account: 0,
			min_confirmations: 1,
		}
	}
}
