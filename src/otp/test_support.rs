//! Shared helpers for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{OtpError, Result};
use crate::store::{InsertOutcome, MemoryStore, OtpRecord, OtpStore};

/// Instant `secs` seconds after a fixed epoch.
pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
}

/// A store whose every call fails.
pub struct FailingStore;

fn unavailable<T>() -> Result<T> {
    Err(OtpError::Store("connection refused".to_string()))
}

#[async_trait]
impl OtpStore for FailingStore {
    async fn insert_if_idle(&self, _: OtpRecord, _: DateTime<Utc>) -> Result<InsertOutcome> {
        unavailable()
    }

    async fn issued_since(&self, _: &str, _: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        unavailable()
    }

    async fn find_active(&self, _: &str, _: &str, _: DateTime<Utc>) -> Result<Option<OtpRecord>> {
        unavailable()
    }

    async fn mark_consumed(&self, _: Uuid, _: DateTime<Utc>) -> Result<bool> {
        unavailable()
    }

    async fn delete_expired(&self, _: DateTime<Utc>) -> Result<u64> {
        unavailable()
    }
}

/// A store that serves reads from `inner` and fails every write.
#[derive(Default)]
pub struct WriteFailingStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl OtpStore for WriteFailingStore {
    async fn insert_if_idle(&self, _: OtpRecord, _: DateTime<Utc>) -> Result<InsertOutcome> {
        unavailable()
    }

    async fn issued_since(&self, identity: &str, since: DateTime<Utc>) -> Result<Vec<DateTime<Utc>>> {
        self.inner.issued_since(identity, since).await
    }

    async fn find_active(
        &self,
        identity: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRecord>> {
        self.inner.find_active(identity, code, now).await
    }

    async fn mark_consumed(&self, _: Uuid, _: DateTime<Utc>) -> Result<bool> {
        unavailable()
    }

    async fn delete_expired(&self, _: DateTime<Utc>) -> Result<u64> {
        unavailable()
    }
}
