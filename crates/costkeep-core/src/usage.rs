use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::ConfigError;

/// Calendar-date format used for target dates and the `results.date` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical shape of one provider's usage for one day, as produced by a
/// provider's `normalize` step and stored as a `results` row.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedUsage {
    pub provider: String,
    pub date: NaiveDate,
    pub tokens: i64,
    pub cost: f64,
    /// Verbatim provider payload, serialized.
    pub raw_json: String,
}

impl NormalizedUsage {
    /// Returns a description of the first problem found, or `None` when the
    /// record is storable.
    #[must_use]
    pub fn problem(&self) -> Option<String> {
        if self.provider.trim().is_empty() {
            return Some("provider name is empty".to_string());
        }
        if self.tokens < 0 {
            return Some(format!("negative token count {}", self.tokens));
        }
        // Negative cost is a credit or refund day and is stored as-is.
        if !self.cost.is_finite() {
            return Some(format!("invalid cost {}", self.cost));
        }
        None
    }
}

/// The day before `now`, in UTC.
///
/// Provider billing data for the current day is still settling, so collection
/// targets yesterday unless a date is given explicitly.
#[must_use]
pub fn default_target_date(now: DateTime<Utc>) -> NaiveDate {
    let today = now.date_naive();
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

/// Parse a `YYYY-MM-DD` date supplied on the command line.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidDate`] if `value` is not a valid calendar date.
pub fn parse_target_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| ConfigError::InvalidDate {
        value: value.to_string(),
    })
}
