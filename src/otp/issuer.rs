//! Passcode issuance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use super::code::generate_code;
use super::limiter::{remaining_cooldown, RateLimitDecision, RateLimiter};
use crate::config::OtpPolicy;
use crate::store::{InsertOutcome, OtpRecord, OtpStore};

const COOLDOWN_REASON: &str = "Please wait before requesting another OTP";
const BUDGET_REASON: &str = "Too many OTP requests. Please try again later";
const ISSUE_FAILED_REASON: &str = "Failed to generate OTP";

/// Result of an issuance request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IssueResult {
    /// A code was generated and stored.
    Issued {
        code: String,
        /// Issuances left in the budget window after this one
        attempts_remaining: u32,
    },
    /// The rate limit policy refused issuance.
    Denied {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remaining_cooldown: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attempts_remaining: Option<u32>,
    },
    /// The store could not be read or written. Never carries policy data.
    Failed { reason: String },
}

impl IssueResult {
    fn cooldown(remaining_secs: u64) -> Self {
        IssueResult::Denied {
            reason: COOLDOWN_REASON.to_string(),
            remaining_cooldown: Some(remaining_secs),
            attempts_remaining: None,
        }
    }

    fn failed(reason: &str) -> Self {
        IssueResult::Failed {
            reason: reason.to_string(),
        }
    }

    pub fn is_issued(&self) -> bool {
        matches!(self, IssueResult::Issued { .. })
    }

    /// The issued code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            IssueResult::Issued { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Runs rate limiting, code generation and the store insert for one
/// issuance request.
pub struct Issuer<S: OtpStore> {
    store: Arc<S>,
    limiter: RateLimiter<S>,
}

impl<S: OtpStore> Issuer<S> {
    pub fn new(store: Arc<S>, policy: OtpPolicy) -> Self {
        let limiter = RateLimiter::new(store.clone(), policy);
        Self { store, limiter }
    }

    pub fn policy(&self) -> &OtpPolicy {
        self.limiter.policy()
    }

    /// Issue a code for `identity` at `now`, or explain why not.
    ///
    /// Creates exactly one record on success and none otherwise.
    #[instrument(skip_all, fields(identity = %identity))]
    pub async fn issue(&self, identity: &str, now: DateTime<Utc>) -> IssueResult {
        let attempts_remaining = match self.limiter.check(identity, now).await {
            RateLimitDecision::Allowed { attempts_remaining } => attempts_remaining,
            RateLimitDecision::Cooldown { remaining_secs } => {
                return IssueResult::cooldown(remaining_secs);
            }
            RateLimitDecision::BudgetExhausted => {
                return IssueResult::Denied {
                    reason: BUDGET_REASON.to_string(),
                    remaining_cooldown: None,
                    attempts_remaining: Some(0),
                };
            }
            RateLimitDecision::Unavailable { reason } => {
                return IssueResult::Failed { reason };
            }
        };

        let policy = self.limiter.policy();
        let record = OtpRecord::new(identity, generate_code(), now, policy.code_ttl());
        let code = record.code.clone();
        let cutoff = now - policy.cooldown();

        match self.store.insert_if_idle(record, cutoff).await {
            Ok(InsertOutcome::Inserted) => {
                let attempts_remaining = attempts_remaining.saturating_sub(1);
                info!(attempts_remaining, "Passcode issued");
                IssueResult::Issued {
                    code,
                    attempts_remaining,
                }
            }
            Ok(InsertOutcome::CooldownActive { latest_issued_at }) => {
                debug!("Concurrent issuance won the cooldown slot");
                IssueResult::cooldown(remaining_cooldown(
                    latest_issued_at,
                    policy.cooldown(),
                    now,
                ))
            }
            Err(e) => {
                error!(error = %e, "Failed to store passcode");
                IssueResult::failed(ISSUE_FAILED_REASON)
            }
        }
    }
}
