mod common;

use common::*;

use axum::http::StatusCode;
use bitcoin::{Amount, Txid};
use chrono::{DateTime, TimeZone, Utc};
use spv_wallet_relay::relay::{
	MemoryRelayRepository, ReceiveAddressRecord, RelayError, RelayRepository, TransactionRecord,
	sign_payload,
};
use std::str::FromStr;
use std::sync::Arc;

const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

fn record(vout: u32, sats: u64) -> TransactionRecord {
	TransactionRecord::new(
		WALLET,
		Txid::from_str(TXID).unwrap(),
		vout,
		ADDRESS_A,
		Amount::from_sat(sats),
		Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap(),
		Some(100),
	)
}

fn header<'a>(request: &'a Captured, name: &str) -> &'a str {
	request.headers.get(name).unwrap().to_str().unwrap()
}

#[tokio::test]
async fn requests_are_signed_over_key_timestamp_and_body() {
	let backend = TestBackend::start().await;
	let repo = Arc::new(MemoryRelayRepository::new());
	let queue = backend.queue(repo.clone());
	queue.enqueue_transaction(&record(0, 50_000)).await.unwrap();

	assert_eq!(queue.send_unsent_transactions().await.unwrap(), 1);

	let requests = backend.requests_to("/api/wallet/transactions");
	assert_eq!(requests.len(), 1);
	let request = &requests[0];

	assert_eq!(header(request, "content-type"), "application/json");
	assert_eq!(header(request, "x-api-key"), API_KEY);

	let timestamp = header(request, "x-timestamp");
	assert!(timestamp.ends_with('Z'));
	assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());

	let expected = sign_payload(API_KEY, timestamp, request.body.as_bytes()).unwrap();
	assert_eq!(header(request, "x-signature"), expected);

	let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
	assert_eq!(
		body,
		serde_json::json!([{
			"wallet_name": WALLET,
			"address": ADDRESS_A,
			"date": "2024-01-01T12:30:00Z",
			"output": format!("{}:0", TXID),
			"value": "0.00050000",
		}])
	);

	assert!(repo.unsent_transactions(WALLET).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_batch_stays_queued_until_accepted() {
	let backend = TestBackend::start().await;
	let repo = Arc::new(MemoryRelayRepository::new());
	let queue = backend.queue(repo.clone());
	queue.enqueue_transaction(&record(0, 1_000)).await.unwrap();
	queue.enqueue_transaction(&record(1, 2_000)).await.unwrap();

	backend.respond_with(StatusCode::INTERNAL_SERVER_ERROR);
	let err = queue.send_unsent_transactions().await.unwrap_err();
	assert!(matches!(err, RelayError::UnexpectedStatus { status: 500, .. }));
	assert_eq!(repo.unsent_transactions(WALLET).await.unwrap().len(), 2);

	// Only 200 counts as delivered.
	backend.respond_with(StatusCode::ACCEPTED);
	assert!(queue.send_unsent_transactions().await.is_err());
	assert_eq!(repo.unsent_transactions(WALLET).await.unwrap().len(), 2);

	backend.respond_with(StatusCode::OK);
	assert_eq!(queue.send_unsent_transactions().await.unwrap(), 2);
	assert!(repo.unsent_transactions(WALLET).await.unwrap().is_empty());
	assert_eq!(backend.requests_to("/api/wallet/transactions").len(), 3);
}

#[tokio::test]
async fn records_enqueued_during_a_send_survive_the_clear() {
	let backend = TestBackend::start().await;
	let repo = Arc::new(MemoryRelayRepository::new());
	let queue = backend.queue(repo.clone());
	queue.enqueue_transaction(&record(0, 1_000)).await.unwrap();

	let (arrived, release) = backend.hold_next();
	let sending = tokio::spawn({
		let queue = queue.clone();
		async move { queue.send_unsent_transactions().await }
	});

	arrived.await.unwrap();
	queue.enqueue_transaction(&record(1, 2_000)).await.unwrap();
	release.send(()).unwrap();

	assert_eq!(sending.await.unwrap().unwrap(), 1);
	let unsent = repo.unsent_transactions(WALLET).await.unwrap();
	assert_eq!(unsent, vec![record(1, 2_000)]);
}

#[tokio::test]
async fn concurrent_drains_post_each_batch_once() {
	let backend = TestBackend::start().await;
	let repo = Arc::new(MemoryRelayRepository::new());
	let queue = backend.queue(repo.clone());
	queue.enqueue_transaction(&record(0, 1_000)).await.unwrap();

	let (arrived, release) = backend.hold_next();
	let first = tokio::spawn({
		let queue = queue.clone();
		async move { queue.send_unsent_transactions().await }
	});
	arrived.await.unwrap();

	let second = tokio::spawn({
		let queue = queue.clone();
		async move { queue.send_unsent_transactions().await }
	});
	tokio::task::yield_now().await;
	release.send(()).unwrap();

	assert_eq!(first.await.unwrap().unwrap(), 1);
	assert_eq!(second.await.unwrap().unwrap(), 0);
	assert_eq!(backend.requests_to("/api/wallet/transactions").len(), 1);
}

#[tokio::test]
async fn empty_queue_sends_nothing() {
	let backend = TestBackend::start().await;
	let queue = backend.queue(Arc::new(MemoryRelayRepository::new()));

	assert_eq!(queue.send_unsent_transactions().await.unwrap(), 0);
	assert_eq!(queue.send_unsent_addresses().await.unwrap(), 0);
	assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn balance_is_posted_with_eight_decimals() {
	let backend = TestBackend::start().await;
	let queue = backend.queue(Arc::new(MemoryRelayRepository::new()));

	queue.send_balance(Amount::from_sat(123_456_789)).await.unwrap();

	let requests = backend.requests_to("/api/wallet/balance");
	assert_eq!(requests.len(), 1);
	let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
	assert_eq!(
		body,
		serde_json::json!({ "wallet_name": WALLET, "balance": "1.23456789" })
	);
}

#[tokio::test]
async fn addresses_are_posted_in_index_order_and_cleared() {
	let backend = TestBackend::start().await;
	let repo = Arc::new(MemoryRelayRepository::new());
	let queue = backend.queue(repo.clone());
	queue
		.enqueue_receive_address(&ReceiveAddressRecord::new(WALLET, 1, ADDRESS_B))
		.await
		.unwrap();
	queue
		.enqueue_receive_address(&ReceiveAddressRecord::new(WALLET, 0, ADDRESS_A))
		.await
		.unwrap();
	assert!(
		!queue
			.enqueue_receive_address(&ReceiveAddressRecord::new(WALLET, 0, ADDRESS_A))
			.await
			.unwrap()
	);

	assert_eq!(queue.send_unsent_addresses().await.unwrap(), 2);

	let requests = backend.requests_to("/api/wallet/addresses");
	let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
	assert_eq!(
		body,
		serde_json::json!([
			{ "index": 0, "address": ADDRESS_A, "wallet_name": WALLET },
			{ "index": 1, "address": ADDRESS_B, "wallet_name": WALLET },
		])
	);
	assert!(repo.unsent_addresses(WALLET).await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
	let backend = TestBackend::start().await;
	let mut config = backend.relay_config();
	config.backend_url = "http://127.0.0.1:9".to_string();
	let relay = spv_wallet_relay::relay::BackendRelay::new(&config).unwrap();

	let err = relay
		.send("/api/wallet/balance", &serde_json::json!({}))
		.await
		.unwrap_err();
	assert!(matches!(err, RelayError::Transport(_)));
}
