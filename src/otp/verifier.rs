//! Passcode verification with single-use enforcement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::code::is_well_formed;
use crate::store::OtpStore;

/// The only rejection reason callers ever see. Wrong, expired, consumed and
/// unknown codes are indistinguishable.
pub const INVALID_REASON: &str = "Invalid or expired OTP";
const VERIFY_FAILED_REASON: &str = "Failed to verify OTP";

/// Result of a verification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyResult {
    /// The code matched a live record, which is now consumed.
    Valid,
    /// No live record matched.
    Invalid { reason: String },
    /// The store failed; nothing was consumed.
    Failed { reason: String },
}

impl VerifyResult {
    fn invalid() -> Self {
        VerifyResult::Invalid {
            reason: INVALID_REASON.to_string(),
        }
    }

    fn failed() -> Self {
        VerifyResult::Failed {
            reason: VERIFY_FAILED_REASON.to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid)
    }
}

/// Checks submitted codes against the store.
pub struct Verifier<S: OtpStore> {
    store: Arc<S>,
}

impl<S: OtpStore> Verifier<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Verify `code` for `identity` at `now`, consuming the matching record.
    ///
    /// Selection picks the newest live match; the consume step is a
    /// compare-and-set, so of several concurrent callers presenting the same
    /// code only one observes `Valid`.
    #[instrument(skip_all, fields(identity = %identity))]
    pub async fn verify(&self, identity: &str, code: &str, now: DateTime<Utc>) -> VerifyResult {
        if !is_well_formed(code) {
            debug!("Rejected malformed passcode");
            return VerifyResult::invalid();
        }

        let record = match self.store.find_active(identity, code, now).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("No live passcode matched");
                return VerifyResult::invalid();
            }
            Err(e) => {
                error!(error = %e, "Passcode lookup failed");
                return VerifyResult::failed();
            }
        };

        match self.store.mark_consumed(record.id, now).await {
            Ok(true) => {
                info!(record_id = %record.id, "Passcode verified");
                VerifyResult::Valid
            }
            Ok(false) => {
                debug!(record_id = %record.id, "Passcode consumed by a concurrent request");
                VerifyResult::invalid()
            }
            Err(e) => {
                error!(record_id = %record.id, error = %e, "Failed to consume passcode");
                VerifyResult::failed()
            }
        }
    }
}
