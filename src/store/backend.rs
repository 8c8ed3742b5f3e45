//! Store trait for abstracting passcode persistence backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::record::OtpRecord;
use crate::error::Result;

/// Outcome of a conditional insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record was stored.
    Inserted,
    /// Another record for the identity was issued after the cutoff; nothing
    /// was stored.
    CooldownActive {
        /// Issuance instant of the newest conflicting record
        latest_issued_at: DateTime<Utc>,
    },
}

/// Trait for passcode store implementations.
///
/// Every method is a single round trip. Implementations must make
/// `insert_if_idle` and `mark_consumed` atomic with respect to concurrent
/// callers on the same identity or record.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Insert `record` unless its identity already has a record issued
    /// strictly after `cutoff`.
    async fn insert_if_idle(
        &self,
        record: OtpRecord,
        cutoff: DateTime<Utc>,
    ) -> Result<InsertOutcome>;

    /// Issuance instants for `identity` strictly after `since`, newest first.
    async fn issued_since(
        &self,
        identity: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>>;

    /// The most recently issued unconsumed record for `identity` whose code
    /// equals `code` and whose expiry lies after `now`.
    async fn find_active(
        &self,
        identity: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRecord>>;

    /// Flip `consumed` on the record `id` if it is still false.
    ///
    /// Returns `true` only for the caller that performed the transition.
    async fn mark_consumed(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool>;

    /// Delete every record with `expires_at <= now`, returning how many
    /// were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
