//! Test doubles shared by the integration tests: a scripted chain client, an in-memory
//! wallet engine, a capturing backend and transaction builders.
#![allow(dead_code)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::Router;
use bitcoin::absolute::LockTime;
use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{
	Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
	Witness,
};
use futures_util::StreamExt;
use spv_wallet_relay::chain::{ChainClient, ChainError, ConnectedBlock, RescanRequest, RescanStream};
use spv_wallet_relay::config::RelayConfig;
use spv_wallet_relay::relay::{BackendRelay, RelayRepository, TransactionRelayQueue};
use spv_wallet_relay::wallet::{WalletEngine, WalletEngineError, WalletTransaction};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

pub const ADDRESS_A: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
pub const ADDRESS_B: &str = "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2";
pub const API_KEY: &str = "test-key";
pub const WALLET: &str = "hot";

pub fn address(s: &str) -> Address {
	s.parse::<Address<NetworkUnchecked>>()
		.unwrap()
		.require_network(Network::Bitcoin)
		.unwrap()
}

/// A transaction spending `(prev, vout)` into the given outputs.
pub fn spend(prev: Txid, vout: u32, outputs: &[(&Address, u64)]) -> Transaction {
	Transaction {
		version: Version::TWO,
		lock_time: LockTime::ZERO,
		input: vec![TxIn {
			previous_output: OutPoint { txid: prev, vout },
			script_sig: ScriptBuf::new(),
			sequence: Sequence::MAX,
			witness: Witness::new(),
		}],
		output: outputs
			.iter()
			.map(|(address, sats)| TxOut {
				value: Amount::from_sat(*sats),
				script_pubkey: address.script_pubkey(),
			})
			.collect(),
	}
}

/// A transaction funded from outside the wallet, told apart by `seed`.
pub fn funding(seed: u32, outputs: &[(&Address, u64)]) -> Transaction {
	spend(Txid::all_zeros(), seed, outputs)
}

pub fn block(height: u32, transactions: Vec<Transaction>) -> ConnectedBlock {
	ConnectedBlock {
		height,
		time: 1_704_067_200 + height * 600,
		transactions,
	}
}

/// Scripted chain client.
pub struct MockChain {
	best_height: Result<u32, ChainError>,
	blocks: Vec<ConnectedBlock>,
	/// Addresses whose rescan never produces anything.
	hanging: HashSet<String>,
	/// Addresses whose rescan fails immediately.
	failing: HashSet<String>,
	sync_state: watch::Sender<bool>,
	sync_completes: bool,
	sync_error: Option<ChainError>,
	pending_syncs: Mutex<Vec<oneshot::Sender<Result<(), ChainError>>>>,
	pub requests: Mutex<Vec<RescanRequest>>,
}

impl MockChain {
	pub fn new(best_height: u32, blocks: Vec<ConnectedBlock>) -> Self {
		let (sync_state, _) = watch::channel(false);
		Self {
			best_height: Ok(best_height),
			blocks,
			hanging: HashSet::new(),
			failing: HashSet::new(),
			sync_state,
			sync_completes: true,
			sync_error: None,
			pending_syncs: Mutex::new(Vec::new()),
			requests: Mutex::new(Vec::new()),
		}
	}

	pub fn unavailable() -> Self {
		let mut chain = Self::new(0, Vec::new());
		chain.best_height = Err(ChainError::Unavailable("connection refused".to_string()));
		chain
	}

	pub fn hang_on(mut self, address: &str) -> Self {
		self.hanging.insert(address.to_string());
		self
	}

	pub fn fail_on(mut self, address: &str) -> Self {
		self.failing.insert(address.to_string());
		self
	}

	/// Keep reporting "synchronizing" and never finish the background wallet sync.
	pub fn still_synchronizing(mut self) -> Self {
		self.sync_state.send_replace(true);
		self.sync_completes = false;
		self
	}

	/// Background wallet sync reports `error` immediately.
	pub fn sync_fails(mut self, error: ChainError) -> Self {
		self.sync_error = Some(error);
		self
	}

	pub fn finish_sync(&self) {
		self.sync_state.send_replace(false);
	}

	pub fn scanned_ranges(&self) -> Vec<(u32, u32)> {
		self.requests
			.lock()
			.unwrap()
			.iter()
			.map(|r| (r.start_height, r.end_height))
			.collect()
	}
}

#[async_trait::async_trait]
impl ChainClient for MockChain {
	async fn best_height(&self) -> Result<u32, ChainError> {
		self.best_height.clone()
	}

	fn sync_state(&self) -> watch::Receiver<bool> {
		self.sync_state.subscribe()
	}

	fn synchronize(&self, _wallet: Arc<dyn WalletEngine>) -> oneshot::Receiver<Result<(), ChainError>> {
		let (tx, rx) = oneshot::channel();
		if let Some(error) = &self.sync_error {
			let _ = tx.send(Err(error.clone()));
		} else if self.sync_completes {
			let _ = tx.send(Ok(()));
		} else {
			self.pending_syncs.lock().unwrap().push(tx);
		}
		rx
	}

	fn rescan(&self, request: RescanRequest, _quit: watch::Receiver<bool>) -> RescanStream {
		let watched: Vec<String> = request
			.watched_addresses
			.iter()
			.map(|a| a.to_string())
			.collect();
		self.requests.lock().unwrap().push(request.clone());

		if watched.iter().any(|a| self.hanging.contains(a)) {
			return futures_util::stream::pending::<Result<ConnectedBlock, ChainError>>().boxed();
		}
		if watched.iter().any(|a| self.failing.contains(a)) {
			return futures_util::stream::iter(vec![Err(ChainError::RescanFailed(
				"peer disconnected".to_string(),
			))])
			.boxed();
		}

		let blocks: Vec<Result<ConnectedBlock, ChainError>> = self
			.blocks
			.iter()
			.filter(|b| b.height >= request.start_height && b.height <= request.end_height)
			.cloned()
			.map(Ok)
			.collect();
		futures_util::stream::iter(blocks).boxed()
	}
}

/// In-memory wallet engine.
pub struct MockWallet {
	pub addresses: Vec<String>,
	pub balance: Result<Amount, WalletEngineError>,
	pub transactions: Vec<WalletTransaction>,
}

impl MockWallet {
	pub fn new(addresses: &[&str], balance: u64) -> Self {
		Self {
			addresses: addresses.iter().map(|a| a.to_string()).collect(),
			balance: Ok(Amount::from_sat(balance)),
			transactions: Vec::new(),
		}
	}
}

#[async_trait::async_trait]
impl WalletEngine for MockWallet {
	fn name(&self) -> &str {
		WALLET
	}

	async fn account_addresses(&self, _account: u32) -> Result<Vec<String>, WalletEngineError> {
		Ok(self.addresses.clone())
	}

	async fn calculate_balance(&self, _min_confirmations: u32) -> Result<Amount, WalletEngineError> {
		self.balance.clone()
	}

	async fn list_all_transactions(&self) -> Result<Vec<WalletTransaction>, WalletEngineError> {
		Ok(self.transactions.clone())
	}
}

/// A request received by the test backend.
#[derive(Debug, Clone)]
pub struct Captured {
	pub path: String,
	pub headers: HeaderMap,
	pub body: String,
}

type Gate = (oneshot::Sender<()>, oneshot::Receiver<()>);

#[derive(Clone)]
struct BackendState {
	captured: Arc<Mutex<Vec<Captured>>>,
	status: Arc<Mutex<StatusCode>>,
	gate: Arc<Mutex<Option<Gate>>>,
}

/// In-process backend recording every relay request.
pub struct TestBackend {
	pub addr: SocketAddr,
	state: BackendState,
}

impl TestBackend {
	pub async fn start() -> Self {
		let state = BackendState {
			captured: Arc::new(Mutex::new(Vec::new())),
			status: Arc::new(Mutex::new(StatusCode::OK)),
			gate: Arc::new(Mutex::new(None)),
		};

		let app = Router::new()
			.route("/api/wallet/transactions", post(capture))
			.route("/api/wallet/balance", post(capture))
			.route("/api/wallet/addresses", post(capture))
			.with_state(state.clone());

		let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, app).await.unwrap();
		});

		Self { addr, state }
	}

	pub fn url(&self) -> String {
		format!("http://{}", self.addr)
	}

	pub fn respond_with(&self, status: StatusCode) {
		*self.state.status.lock().unwrap() = status;
	}

	/// Hold the next request until the returned sender fires. The first receiver resolves
	/// once that request has arrived.
	pub fn hold_next(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
		let (arrived_tx, arrived_rx) = oneshot::channel();
		let (release_tx, release_rx) = oneshot::channel();
		*self.state.gate.lock().unwrap() = Some((arrived_tx, release_rx));
		(arrived_rx, release_tx)
	}

	pub fn requests(&self) -> Vec<Captured> {
		self.state.captured.lock().unwrap().clone()
	}

	pub fn requests_to(&self, path: &str) -> Vec<Captured> {
		self.requests().into_iter().filter(|r| r.path == path).collect()
	}

	pub fn relay_config(&self) -> RelayConfig {
		let url = self.url();
		RelayConfig::from_lookup(move |key| match key {
			"BACKEND_URL" => Some(url.clone()),
			"BACKEND_API_KEY" => Some(API_KEY.to_string()),
			"WALLET_NAME" => Some(WALLET.to_string()),
			"RELAY_ENABLED" => Some("true".to_string()),
			"BITCOIN_NETWORK" => Some("bitcoin".to_string()),
			_ => None,
		})
		.unwrap()
	}

	pub fn queue(&self, repo: Arc<dyn RelayRepository>) -> Arc<TransactionRelayQueue> {
		let config = self.relay_config();
		let relay = BackendRelay::new(&config).unwrap();
		Arc::new(TransactionRelayQueue::new(repo, relay, &config.wallet_name))
	}
}

async fn capture(
	State(state): State<BackendState>,
	uri: Uri,
	headers: HeaderMap,
	body: String,
) -> StatusCode {
	state.captured.lock().unwrap().push(Captured {
		path: uri.path().to_string(),
		headers,
		body,
	});

	let gate = state.gate.lock().unwrap().take();
	if let Some((arrived, release)) = gate {
		let _ = arrived.send(());
		let _ = release.await;
	}

	*state.status.lock().unwrap()
}
