use spv_wallet_relay::config::RelayConfig;
use spv_wallet_relay::relay::{BackendRelay, FileRelayRepository, TransactionRelayQueue};

use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	// Honour RUST_LOG, otherwise log this crate at debug and everything else at info
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("info,spv_wallet_relay=debug")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting wallet relay");

	let config = match RelayConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Invalid configuration: {}", e);
			return;
		}
	};

	if !config.relay_enabled {
		warn!("RELAY_ENABLED is not set, nothing to do");
		return;
	}

	let relay = match BackendRelay::new(&config) {
		Ok(relay) => relay,
		Err(e) => {
			error!("Failed to create backend client: {}", e);
			return;
		}
	};

	let repo = Arc::new(FileRelayRepository::new(
		config.data_dir.clone(),
		&config.wallet_name,
	));
	let queue = TransactionRelayQueue::new(repo, relay, &config.wallet_name);

	info!(
		"Relaying wallet {} to {} (data dir {:?})",
		config.wallet_name, config.backend_url, config.data_dir
	);

	if !config.server_mode {
		drain(&queue).await;
		return;
	}

	let mut interval = tokio::time::interval(config.relay_interval);
	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("Shutdown requested, stopping relay");
				break;
			}
			_ = interval.tick() => drain(&queue).await,
		}
	}
}

/// Push everything still queued to the backend. Failures stay queued for the next drain.
async fn drain(queue: &TransactionRelayQueue) {
	match queue.send_unsent_transactions().await {
		Ok(count) => info!("Transactions relayed: {}", count),
		Err(e) => error!("Failed to relay transactions: {}", e),
	}

	match queue.send_unsent_addresses().await {
		Ok(count) => info!("Addresses relayed: {}", count),
		Err(e) => error!("Failed to relay addresses: {}", e),
	}
}
