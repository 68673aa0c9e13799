//! Fakes shared by the engine and batch tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use costkeep_core::NormalizedUsage;
use costkeep_db::PoolConfig;
use costkeep_providers::{normalize_totals, FetchError, UsageProvider};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub(crate) async fn test_pool() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let pool = costkeep_db::connect_pool(&dir.path().join("costkeep.db"), PoolConfig::default())
        .await
        .expect("failed to open sqlite pool");
    costkeep_db::init_schema(&pool)
        .await
        .expect("init_schema failed");
    (dir, pool)
}

pub(crate) fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date")
}

/// In-memory provider that answers every fetch with a fixed payload, or with
/// an HTTP 500 when built with [`FakeProvider::failing`].
pub(crate) struct FakeProvider {
    name: &'static str,
    response: Option<serde_json::Value>,
    fetches: AtomicUsize,
}

impl FakeProvider {
    pub(crate) fn returning(name: &'static str, response: serde_json::Value) -> Self {
        Self {
            name,
            response: Some(response),
            fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(name: &'static str) -> Self {
        Self {
            name,
            response: None,
            fetches: AtomicUsize::new(0),
        }
    }

    pub(crate) fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageProvider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(
        &self,
        _api_key: &str,
        _date: NaiveDate,
    ) -> Result<serde_json::Value, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| FetchError::UnexpectedStatus {
                status: 500,
                url: "http://fake.invalid/v1/usage".to_string(),
            })
    }

    fn normalize(&self, raw: &serde_json::Value, date: NaiveDate) -> NormalizedUsage {
        normalize_totals(self.name, raw, date)
    }
}
