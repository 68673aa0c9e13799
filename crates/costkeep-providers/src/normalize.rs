//! Mapping of provider usage payloads into [`NormalizedUsage`].
//!
//! Normalization is total: any JSON value produces a record. Missing or
//! ill-typed numeric fields default to zero.

use chrono::NaiveDate;
use costkeep_core::NormalizedUsage;
use serde_json::Value;

/// Builds a [`NormalizedUsage`] from a payload carrying `total_tokens` and
/// `total_cost` at the top level.
#[must_use]
pub fn normalize_totals(provider: &str, raw: &Value, date: NaiveDate) -> NormalizedUsage {
    NormalizedUsage {
        provider: provider.to_string(),
        date,
        tokens: read_tokens(raw.get("total_tokens")),
        cost: read_cost(raw.get("total_cost")),
        raw_json: raw.to_string(),
    }
}

// Float-to-int `as` saturates, which is the wanted behavior for huge values.
#[allow(clippy::cast_possible_truncation)]
fn read_tokens(value: Option<&Value>) -> i64 {
    let Some(value) = value else {
        return 0;
    };
    if let Some(n) = value.as_i64() {
        return n;
    }
    if let Some(n) = value.as_u64() {
        return i64::try_from(n).unwrap_or(i64::MAX);
    }
    match value.as_f64() {
        Some(n) if n.is_finite() => n.round() as i64,
        _ => 0,
    }
}

fn read_cost(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}
