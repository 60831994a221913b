//!
//! Signed HTTP client for the wallet backend.
//!
//! Every request carries the API key, a UTC timestamp and an HMAC-SHA256 signature over
//! `api_key || timestamp || body`, keyed by the API key. Only HTTP 200 counts as delivered.

use super::types::RelayError;
use crate::config::RelayConfig;
use crate::utils::format_timestamp;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `api_key || timestamp || body`, keyed by `api_key`.
pub fn sign_payload(api_key: &str, timestamp: &str, body: &[u8]) -> Result<String, RelayError> {
	let mut mac = HmacSha256::new_from_slice(api_key.as_bytes())
		.map_err(|e| RelayError::Signing(e.to_string()))?;
	mac.update(api_key.as_bytes());
	mac.update(timestamp.as_bytes());
	mac.update(body);
	Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Backend relay client
#[derive(Clone)]
pub struct BackendRelay {
	/// The underlying HTTP client.
	http_client: Client,
	/// Backend base URL, without a trailing slash.
	backend_url: String,
	/// API key sent in `X-API-Key` and used as the HMAC key.
	api_key: String,
}

impl BackendRelay {
	/// Create a new relay client from the relay configuration.
	///
	/// # Errors
	/// Returns `RelayError::Transport` if the HTTP client cannot be built.
	pub fn new(config: &RelayConfig) -> Result<Self, RelayError> {
		let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

		Ok(Self {
			http_client,
			backend_url: config.backend_url.trim_end_matches('/').to_string(),
			api_key: config.api_key.clone(),
		})
	}

	pub fn backend_url(&self) -> &str {
		&self.backend_url
	}

	/// Serialize `payload` as JSON and post it to `endpoint`.
	pub async fn send<T>(&self, endpoint: &str, payload: &T) -> Result<(), RelayError>
	where
		T: Serialize + ?Sized,
	{
		let body = serde_json::to_string(payload)?;
		self.send_body(endpoint, body, Utc::now()).await
	}

	/// Post an already serialized JSON `body` to `endpoint`, signed at `now`.
	///
	/// # Errors
	/// Returns `RelayError::Transport` on connection failures and
	/// `RelayError::UnexpectedStatus` for any response other than 200.
	pub async fn send_body(
		&self,
		endpoint: &str,
		body: String,
		now: DateTime<Utc>,
	) -> Result<(), RelayError> {
		let timestamp = format_timestamp(now);
		let signature = sign_payload(&self.api_key, &timestamp, body.as_bytes())?;
		let url = format!("{}{}", self.backend_url, endpoint);

		debug!("Posting {} bytes to {}", body.len(), url);

		let response = self
			.http_client
			.post(&url)
			.header(CONTENT_TYPE, "application/json")
			.header("X-API-Key", &self.api_key)
			.header("X-Timestamp", &timestamp)
			.header("X-Signature", &signature)
			.body(body)
			.send()
			.await?;

		let status = response.status();
		if status != StatusCode::OK {
			let body = response.text().await.unwrap_or_default();
			return Err(RelayError::UnexpectedStatus {
				endpoint: endpoint.to_string(),
				status: status.as_u16(),
				body,
			});
		}

		info!("Backend accepted {}", endpoint);
		Ok(())
	}
}
