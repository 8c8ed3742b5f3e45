//! Per-identity issuance rate limiting.
//!
//! Nothing here keeps counters. Cooldown and budget state are derived from
//! the store's issuance history on every check.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::config::OtpPolicy;
use crate::store::OtpStore;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Issuance may proceed; `attempts_remaining` counts the slots left in
    /// the budget window before this issuance.
    Allowed { attempts_remaining: u32 },
    /// A code was issued within the cooldown window.
    Cooldown { remaining_secs: u64 },
    /// The budget window already holds the maximum number of issuances.
    BudgetExhausted,
    /// The history could not be read; treated as a denial.
    Unavailable { reason: String },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Seconds left before a record issued at `issued_at` leaves the cooldown
/// window, rounded up and clamped at zero.
pub fn remaining_cooldown(issued_at: DateTime<Utc>, cooldown: Duration, now: DateTime<Utc>) -> u64 {
    let millis = (issued_at + cooldown - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        ((millis + 999) / 1000) as u64
    }
}

/// Evaluates the issuance policy for an identity against stored history.
pub struct RateLimiter<S: OtpStore> {
    store: Arc<S>,
    policy: OtpPolicy,
}

impl<S: OtpStore> RateLimiter<S> {
    /// Create a rate limiter reading history from `store`.
    pub fn new(store: Arc<S>, policy: OtpPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Decide whether a code may be issued to `identity` at `now`.
    ///
    /// The cooldown is checked before the budget so that a caller hitting
    /// both gets the wait time.
    pub async fn check(&self, identity: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let cooldown = self.policy.cooldown();
        let window = self.policy.budget_window();
        let lookback = std::cmp::max(cooldown, window);

        let history = match self.store.issued_since(identity, now - lookback).await {
            Ok(history) => history,
            Err(e) => {
                error!(identity = %identity, error = %e, "Rate limit history read failed");
                return RateLimitDecision::Unavailable {
                    reason: "Unable to verify rate limit".to_string(),
                };
            }
        };

        trace!(identity = %identity, records = history.len(), "Checking issuance rate limit");

        let cooldown_start = now - cooldown;
        if let Some(latest) = history.iter().copied().filter(|t| *t > cooldown_start).max() {
            let remaining_secs = remaining_cooldown(latest, cooldown, now);
            debug!(identity = %identity, remaining_secs, "Issuance cooldown active");
            return RateLimitDecision::Cooldown { remaining_secs };
        }

        let window_start = now - window;
        let count = history.iter().filter(|t| **t > window_start).count() as u32;
        if count >= self.policy.hourly_limit {
            debug!(identity = %identity, count, "Issuance budget exhausted");
            return RateLimitDecision::BudgetExhausted;
        }

        RateLimitDecision::Allowed {
            attempts_remaining: self.policy.hourly_limit - count,
        }
    }
}
