use chrono::{DateTime, SecondsFormat, Utc};

/// Number of decimal places used when rendering on-chain amounts.
pub const BTC_DECIMALS: u32 = 8;

/// Render an amount in the chain's atomic unit as a fixed 8-decimal string.
pub fn format_btc_amount(sats: u64) -> String {
	let unit = 10u64.pow(BTC_DECIMALS);
	format!(
		"{}.{:0width$}",
		sats / unit,
		sats % unit,
		width = BTC_DECIMALS as usize
	)
}

/// Strict RFC3339 rendering in UTC with second precision, e.g. `2024-01-01T00:00:00Z`.
pub fn format_timestamp(time: DateTime<Utc>) -> String {
	time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
