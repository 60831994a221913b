use bitcoin::{Address, Amount, Network, Transaction, TxOut, Txid};
use std::collections::HashMap;
use tracing::debug;

/// Transactions observed so far in one rescan pass, keyed by txid.
///
/// Populated in block order by a single sequential scan flow. Scanning addresses in
/// parallel would require sharding or locking this cache.
#[derive(Debug, Default, Clone)]
pub struct KnownTransactionCache {
	transactions: HashMap<Txid, Transaction>,
}

impl KnownTransactionCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, tx: Transaction) {
		self.transactions.insert(tx.compute_txid(), tx);
	}

	pub fn get(&self, txid: &Txid) -> Option<&Transaction> {
		self.transactions.get(txid)
	}

	pub fn len(&self) -> usize {
		self.transactions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.transactions.is_empty()
	}
}

/// Net amounts a transaction moved to and from one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedAmounts {
	pub received: Amount,
	pub sent: Amount,
}

impl ResolvedAmounts {
	pub fn is_relevant(&self) -> bool {
		self.received > Amount::ZERO || self.sent > Amount::ZERO
	}
}

/// Reconstructs direction and amount of transactions for a watched address.
///
/// `sent` is best effort: an input whose previous transaction is not in the cache is
/// skipped, so `sent == 0` does not prove the address spent nothing.
#[derive(Debug, Clone, Copy)]
pub struct TransactionAmountResolver {
	network: Network,
}

impl TransactionAmountResolver {
	pub fn new(network: Network) -> Self {
		Self { network }
	}

	pub fn network(&self) -> Network {
		self.network
	}

	/// Compute `(received, sent)` of `tx` for `target` using the transactions in `cache`.
	pub fn resolve(
		&self,
		tx: &Transaction,
		target: &Address,
		cache: &KnownTransactionCache,
	) -> ResolvedAmounts {
		let received = tx
			.output
			.iter()
			.filter(|output| self.pays_to(output, target))
			.map(|output| output.value)
			.sum();

		let sent = tx
			.input
			.iter()
			.filter_map(|input| {
				let outpoint = &input.previous_output;
				let Some(previous) = cache.get(&outpoint.txid) else {
					debug!("Previous transaction {} not in cache, skipping input", outpoint.txid);
					return None;
				};
				previous.output.get(outpoint.vout as usize)
			})
			.filter(|output| self.pays_to(output, target))
			.map(|output| output.value)
			.sum();

		ResolvedAmounts { received, sent }
	}

	/// Resolve `tx`, then record it in `cache` so later transactions can spend its outputs.
	pub fn observe(
		&self,
		tx: &Transaction,
		target: &Address,
		cache: &mut KnownTransactionCache,
	) -> ResolvedAmounts {
		let amounts = self.resolve(tx, target, cache);
		cache.insert(tx.clone());
		amounts
	}

	/// Output indices of `tx` paying `target`, with their values.
	pub fn matching_outputs(&self, tx: &Transaction, target: &Address) -> Vec<(u32, Amount)> {
		tx.output
			.iter()
			.enumerate()
			.filter(|(_, output)| self.pays_to(output, target))
			.map(|(vout, output)| (vout as u32, output.value))
			.collect()
	}

	fn pays_to(&self, output: &TxOut, target: &Address) -> bool {
		Address::from_script(&output.script_pubkey, self.network)
			.map(|address| &address == target)
			.unwrap_or(false)
	}
}
