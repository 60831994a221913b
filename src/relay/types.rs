//! Types for the backend relay protocol

use crate::utils::{format_btc_amount, format_timestamp};

use bitcoin::{Amount, Txid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Endpoint receiving unsent transactions.
pub const TRANSACTIONS_ENDPOINT: &str = "/api/wallet/transactions";
/// Endpoint receiving the current balance.
pub const BALANCE_ENDPOINT: &str = "/api/wallet/balance";
/// Endpoint receiving unsent receive addresses.
pub const ADDRESSES_ENDPOINT: &str = "/api/wallet/addresses";

/// Identity of a transaction record: one output of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub txid: Txid,
    pub vout: u32,
}

/// One wallet-relevant transaction output waiting to be relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub txid: Txid,
    pub wallet_name: String,
    /// Composite identity, `txid:vout`.
    pub output: String,
    /// Address the output pays.
    pub address: String,
    /// Fixed 8-decimal amount.
    pub value: String,
    pub timestamp: DateTime<Utc>,
    /// Confirmed height, `None` while unconfirmed.
    pub block_height: Option<u32>,
    pub vout: u32,
    /// Set once the backend has accepted a batch containing this record.
    #[serde(default)]
    pub sent: bool,
}

impl TransactionRecord {
    pub fn new(
        wallet_name: &str,
        txid: Txid,
        vout: u32,
        address: &str,
        amount: Amount,
        timestamp: DateTime<Utc>,
        block_height: Option<u32>,
    ) -> Self {
        Self {
            txid,
            wallet_name: wallet_name.to_string(),
            output: format!("{}:{}", txid, vout),
            address: address.to_string(),
            value: format_btc_amount(amount.to_sat()),
            timestamp,
            block_height,
            vout,
            sent: false,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            txid: self.txid,
            vout: self.vout,
        }
    }
}

/// A wallet address waiting to be announced to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveAddressRecord {
    /// Ordinal index of the address in the account.
    pub index: u32,
    pub address: String,
    pub wallet_name: String,
    #[serde(default)]
    pub sent: bool,
}

impl ReceiveAddressRecord {
    pub fn new(wallet_name: &str, index: u32, address: &str) -> Self {
        Self {
            index,
            address: address.to_string(),
            wallet_name: wallet_name.to_string(),
            sent: false,
        }
    }
}

/// Wire form of a transaction record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub wallet_name: String,
    pub address: String,
    pub date: String,
    pub output: String,
    pub value: String,
}

impl From<&TransactionRecord> for TransactionPayload {
    fn from(record: &TransactionRecord) -> Self {
        Self {
            wallet_name: record.wallet_name.clone(),
            address: record.address.clone(),
            date: format_timestamp(record.timestamp),
            output: record.output.clone(),
            value: record.value.clone(),
        }
    }
}

/// Wire form of the balance report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePayload {
    pub wallet_name: String,
    /// Fixed 8-decimal amount.
    pub balance: String,
}

/// Wire form of a receive address record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPayload {
    pub index: u32,
    pub address: String,
    pub wallet_name: String,
}

impl From<&ReceiveAddressRecord> for AddressPayload {
    fn from(record: &ReceiveAddressRecord) -> Self {
        Self {
            index: record.index,
            address: record.address.clone(),
            wallet_name: record.wallet_name.clone(),
        }
    }
}

/// Error types for relay operations. Any of them leaves the queue untouched.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend rejected {endpoint} with status {status}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to sign request: {0}")]
    Signing(String),

    #[error("Relay queue storage error: {0}")]
    Storage(String),
}
