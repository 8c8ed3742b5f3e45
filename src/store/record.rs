//! The persisted passcode record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One successful issuance.
///
/// History is retained per identity; records are only ever removed by the
/// janitor once expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpRecord {
    /// Store-assigned identifier used for the consume step
    pub id: Uuid,
    /// Email address the code was issued for, compared verbatim
    pub identity: String,
    /// Six distinct ASCII digits
    pub code: String,
    pub issued_at: DateTime<Utc>,
    /// Always `issued_at + ttl`
    pub expires_at: DateTime<Utc>,
    /// Monotonic: never reverts to false
    pub consumed: bool,
    /// Set exactly once, together with `consumed`
    pub consumed_at: Option<DateTime<Utc>>,
}

impl OtpRecord {
    /// Create a fresh, unconsumed record.
    pub fn new(identity: &str, code: String, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.to_string(),
            code,
            issued_at,
            expires_at: issued_at + ttl,
            consumed: false,
            consumed_at: None,
        }
    }

    /// Whether the record has passed its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether `code` can still be redeemed against this record at `now`.
    pub fn is_redeemable(&self, code: &str, now: DateTime<Utc>) -> bool {
        !self.consumed && !self.is_expired(now) && self.code == code
    }
}
