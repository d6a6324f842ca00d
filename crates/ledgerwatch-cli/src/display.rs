//! Formatting of ledger and account data for the terminal

use chrono::{DateTime, SecondsFormat};
use serde_json::Value;

/// Seconds between the Unix epoch and the ledger epoch (2000-01-01T00:00:00Z)
pub const LEDGER_EPOCH_OFFSET: i64 = 946_684_800;

/// Drops in one XRP
pub const DROPS_PER_XRP: u64 = 1_000_000;

/// Render a ledger close time (seconds since the ledger epoch) as ISO-8601 UTC
///
/// Returns `None` if the time is outside what `chrono` can represent.
pub fn ledger_time_to_iso(ledger_time: u64) -> Option<String> {
    let secs = i64::try_from(ledger_time)
        .ok()?
        .checked_add(LEDGER_EPOCH_OFFSET)?;
    DateTime::from_timestamp(secs, 0).map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Convert an amount of drops (as sent on the wire) to an XRP string
///
/// Trailing fractional zeros are dropped, so `"25000000"` becomes `"25"`.
/// Returns `None` if `drops` is not an unsigned integer.
pub fn drops_to_xrp(drops: &str) -> Option<String> {
    let drops: u64 = drops.parse().ok()?;
    let whole = drops / DROPS_PER_XRP;
    let fraction = drops % DROPS_PER_XRP;

    if fraction == 0 {
        return Some(whole.to_string());
    }
    let fraction = format!("{:06}", fraction);
    Some(format!("{}.{}", whole, fraction.trim_end_matches('0')))
}

/// One-line summary of a ledger from a subscribe result or `ledgerClosed` event
pub fn describe_ledger(ledger: &Value) -> String {
    let index = ledger
        .get("ledger_index")
        .map(Value::to_string)
        .unwrap_or_else(|| "?".to_string());
    let hash = ledger
        .get("ledger_hash")
        .and_then(Value::as_str)
        .unwrap_or("?");
    let closed = ledger
        .get("ledger_time")
        .and_then(Value::as_u64)
        .and_then(ledger_time_to_iso)
        .unwrap_or_else(|| "?".to_string());

    format!("Ledger #{} {} closed {}", index, hash, closed)
}

/// One-line summary of an `account_info` result
pub fn describe_account(info: &Value) -> String {
    let data = &info["account_data"];
    let account = data["Account"].as_str().unwrap_or("<account>");
    let balance = data["Balance"]
        .as_str()
        .and_then(drops_to_xrp)
        .unwrap_or_else(|| "?".to_string());

    let at = info
        .get("ledger_index")
        .or_else(|| info.get("ledger_current_index"))
        .map(|index| format!(" (ledger {})", index))
        .unwrap_or_default();

    format!("{} balance {} XRP{}", account, balance, at)
}
