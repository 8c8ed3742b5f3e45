//! In-process store backed by sharded concurrent maps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};
use uuid::Uuid;

use super::backend::{InsertOutcome, OtpStore};
use super::record::OtpRecord;
use crate::error::Result;

/// A passcode store held in memory.
///
/// Records are grouped by identity. Every mutation goes through the
/// identity's map entry, whose shard lock provides the isolation the
/// conditional insert and the consume step need.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Issuance history indexed by identity
    records: DashMap<String, Vec<OtpRecord>>,
    /// Record id to owning identity
    index: DashMap<Uuid, String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all records for `identity`, in insertion order.
    pub fn records_for(&self, identity: &str) -> Vec<OtpRecord> {
        self.records
            .get(identity)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn insert_if_idle(
        &self,
        record: OtpRecord,
        cutoff: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        let id = record.id;
        let identity = record.identity.clone();

        {
            let mut history = self.records.entry(identity.clone()).or_default();

            let latest = history
                .iter()
                .map(|r| r.issued_at)
                .filter(|issued_at| *issued_at > cutoff)
                .max();

            if let Some(latest_issued_at) = latest {
                trace!(identity = %identity, "Conditional insert lost to a recent record");
                return Ok(InsertOutcome::CooldownActive { latest_issued_at });
            }

            history.push(record);
        }

        self.index.insert(id, identity.clone());
        debug!(identity = %identity, record_id = %id, "Stored passcode record");
        Ok(InsertOutcome::Inserted)
    }

    async fn issued_since(
        &self,
        identity: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let mut issued: Vec<DateTime<Utc>> = self
            .records
            .get(identity)
            .map(|history| {
                history
                    .iter()
                    .map(|r| r.issued_at)
                    .filter(|issued_at| *issued_at > since)
                    .collect()
            })
            .unwrap_or_default();

        issued.sort_unstable_by(|a, b| b.cmp(a));
        Ok(issued)
    }

    async fn find_active(
        &self,
        identity: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRecord>> {
        let found = self.records.get(identity).and_then(|history| {
            history
                .iter()
                .filter(|r| r.is_redeemable(code, now))
                .max_by_key(|r| r.issued_at)
                .cloned()
        });
        Ok(found)
    }

    async fn mark_consumed(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool> {
        // Release the index guard before touching the record map.
        let identity = match self.index.get(&id) {
            Some(entry) => entry.value().clone(),
            None => return Ok(false),
        };

        // A purge may have dropped the history before its index entries.
        let mut history = match self.records.get_mut(&identity) {
            Some(history) => history,
            None => return Ok(false),
        };

        match history.iter_mut().find(|r| r.id == id) {
            Some(record) if !record.consumed => {
                record.consumed = true;
                record.consumed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut removed: Vec<Uuid> = Vec::new();

        self.records.retain(|_, history| {
            history.retain(|r| {
                if r.is_expired(now) {
                    removed.push(r.id);
                    false
                } else {
                    true
                }
            });
            !history.is_empty()
        });

        for id in &removed {
            self.index.remove(id);
        }

        Ok(removed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(identity: &str, code: &str, issued: i64) -> OtpRecord {
        OtpRecord::new(identity, code.to_string(), at(issued), Duration::minutes(5))
    }

    #[tokio::test]
    async fn test_insert_if_idle_respects_cutoff() {
        let store = MemoryStore::new();

        let outcome = store
            .insert_if_idle(record("a@x.io", "012345", 0), at(-60))
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let outcome = store
            .insert_if_idle(record("a@x.io", "678901", 30), at(-30))
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::CooldownActive { latest_issued_at: at(0) });
        assert_eq!(store.len(), 1);

        // A different identity is unaffected
        let outcome = store
            .insert_if_idle(record("b@x.io", "678901", 30), at(-30))
            .await
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
    }

    #[tokio::test]
    async fn test_issued_since_newest_first() {
        let store = MemoryStore::new();
        for (code, issued) in [("012345", 0), ("123456", 100), ("234567", 200)] {
            store
                .insert_if_idle(record("a@x.io", code, issued), at(issued - 60))
                .await
                .unwrap();
        }

        let issued = store.issued_since("a@x.io", at(0)).await.unwrap();
        assert_eq!(issued, vec![at(200), at(100)]);

        let none = store.issued_since("nobody@x.io", at(0)).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_find_active_prefers_most_recent() {
        let store = MemoryStore::new();
        let older = record("a@x.io", "012345", 0);
        let newer = record("a@x.io", "012345", 100);
        let newer_id = newer.id;
        store.insert_if_idle(older, at(-60)).await.unwrap();
        store.insert_if_idle(newer, at(40)).await.unwrap();

        let found = store.find_active("a@x.io", "012345", at(120)).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(newer_id));
    }

    #[tokio::test]
    async fn test_mark_consumed_is_compare_and_set() {
        let store = MemoryStore::new();
        let rec = record("a@x.io", "012345", 0);
        let id = rec.id;
        store.insert_if_idle(rec, at(-60)).await.unwrap();

        assert!(store.mark_consumed(id, at(5)).await.unwrap());
        assert!(!store.mark_consumed(id, at(6)).await.unwrap());

        let stored = &store.records_for("a@x.io")[0];
        assert!(stored.consumed);
        assert_eq!(stored.consumed_at, Some(at(5)));

        assert!(!store.mark_consumed(Uuid::new_v4(), at(7)).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_consumed_after_history_purged() {
        let store = MemoryStore::new();
        let rec = record("a@x.io", "012345", 0);
        let id = rec.id;
        store.insert_if_idle(rec, at(-60)).await.unwrap();

        // Index entry still present, history already gone
        store.records.remove("a@x.io");
        assert!(!store.mark_consumed(id, at(400)).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_expired_keeps_live_records() {
        let store = MemoryStore::new();
        let consumed = record("a@x.io", "012345", 0);
        let consumed_id = consumed.id;
        store.insert_if_idle(consumed, at(-60)).await.unwrap();
        store.insert_if_idle(record("a@x.io", "123456", 100), at(40)).await.unwrap();
        store.mark_consumed(consumed_id, at(10)).await.unwrap();

        let removed = store.delete_expired(at(300)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.records_for("a@x.io")[0].code, "123456");

        // Idempotent
        assert_eq!(store.delete_expired(at(300)).await.unwrap(), 0);

        assert_eq!(store.delete_expired(at(400)).await.unwrap(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_usable_outside_runtime() {
        let store = MemoryStore::new();
        let outcome =
            tokio_test::block_on(store.insert_if_idle(record("a@x.io", "012345", 0), at(-60)))
                .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);
    }
}
