//! The three caller-facing operations over a shared store.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::issuer::{IssueResult, Issuer};
use super::janitor::Janitor;
use super::verifier::{VerifyResult, Verifier};
use crate::clock::{Clock, SystemClock};
use crate::config::OtpPolicy;
use crate::store::OtpStore;

/// Issues, verifies and purges passcodes.
///
/// Holds no per-request state; every decision is re-derived from the store,
/// so one engine can serve any number of concurrent requests.
pub struct OtpEngine<S: OtpStore> {
    store: Arc<S>,
    issuer: Issuer<S>,
    verifier: Verifier<S>,
    janitor: Janitor<S>,
    clock: Arc<dyn Clock>,
}

impl<S: OtpStore> OtpEngine<S> {
    /// Create an engine reading the wall clock.
    pub fn new(store: Arc<S>, policy: OtpPolicy) -> Self {
        Self::with_clock(store, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, policy: OtpPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            issuer: Issuer::new(store.clone(), policy),
            verifier: Verifier::new(store.clone()),
            janitor: Janitor::new(store.clone()),
            store,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn policy(&self) -> &OtpPolicy {
        self.issuer.policy()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn janitor(&self) -> &Janitor<S> {
        &self.janitor
    }

    pub async fn issue(&self, identity: &str, now: DateTime<Utc>) -> IssueResult {
        self.issuer.issue(identity, now).await
    }

    pub async fn verify(&self, identity: &str, code: &str, now: DateTime<Utc>) -> VerifyResult {
        self.verifier.verify(identity, code, now).await
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) {
        self.janitor.purge_expired(now).await
    }

    /// [`issue`](Self::issue) at the engine clock's current instant.
    pub async fn issue_now(&self, identity: &str) -> IssueResult {
        self.issue(identity, self.clock.now()).await
    }

    /// [`verify`](Self::verify) at the engine clock's current instant.
    pub async fn verify_now(&self, identity: &str, code: &str) -> VerifyResult {
        self.verify(identity, code, self.clock.now()).await
    }

    /// [`purge_expired`](Self::purge_expired) at the engine clock's current instant.
    pub async fn purge_expired_now(&self) {
        self.purge_expired(self.clock.now()).await
    }
}
