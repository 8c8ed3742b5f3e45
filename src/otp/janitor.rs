//! Expired record maintenance.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::store::OtpStore;

/// Purges expired records, consumed or not.
pub struct Janitor<S: OtpStore> {
    store: Arc<S>,
}

impl<S: OtpStore> Janitor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Delete every record with `expires_at <= now`.
    ///
    /// Failures are logged and swallowed; the next run picks up whatever
    /// this one left behind.
    pub async fn purge_expired(&self, now: DateTime<Utc>) {
        match self.store.delete_expired(now).await {
            Ok(0) => debug!("No expired passcodes to purge"),
            Ok(removed) => info!(removed, "Purged expired passcodes"),
            Err(e) => warn!(error = %e, "Failed to purge expired passcodes"),
        }
    }

    /// Purge on a fixed `period` until `shutdown` resolves.
    pub async fn run<C, F>(&self, clock: &C, period: Duration, shutdown: F)
    where
        C: Clock + ?Sized,
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(period_secs = period.as_secs(), "Janitor started");
        loop {
            tokio::select! {
                _ = ticker.tick() => self.purge_expired(clock.now()).await,
                _ = &mut shutdown => break,
            }
        }
        info!("Janitor stopped");
    }
}
