//! Passwordless login: gate the identity, issue a code, mail it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::mailer::{render_login_email, Mailer};
use crate::config::Settings;
use crate::otp::{IssueResult, OtpEngine, VerifyResult};
use crate::store::OtpStore;

const INVALID_IDENTITY_REASON: &str = "Invalid email format";

/// Predicate deciding whether an identity may enter the login flow at all.
///
/// Address syntax and typo checks live behind this trait.
pub trait IdentityGate: Send + Sync {
    fn admits(&self, identity: &str) -> bool;
}

impl<F> IdentityGate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn admits(&self, identity: &str) -> bool {
        self(identity)
    }
}

/// Minimal address shape check: something on both sides of a single `@`
/// and a dot inside the domain.
pub fn has_email_shape(identity: &str) -> bool {
    match identity.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .map_or(false, |(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

/// Result of a login request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginOutcome {
    /// A code was issued and accepted by the mail transport.
    Sent {
        message_id: String,
        attempts_remaining: u32,
    },
    /// The identity gate refused the address; nothing was issued.
    InvalidIdentity { reason: String },
    /// Issuance was refused by the rate limit policy.
    Denied {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remaining_cooldown: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attempts_remaining: Option<u32>,
    },
    /// Issuance failed on a store fault.
    Failed { reason: String },
    /// A code was issued but the transport refused it. The issuance still
    /// counts against the cooldown and the budget.
    DeliveryFailed { reason: String },
}

/// Drives a login from the submitted address to a delivered code.
pub struct LoginFlow<S: OtpStore, M: Mailer, G: IdentityGate> {
    engine: Arc<OtpEngine<S>>,
    mailer: Arc<M>,
    gate: G,
    settings: Settings,
}

impl<S: OtpStore, M: Mailer, G: IdentityGate> LoginFlow<S, M, G> {
    pub fn new(engine: Arc<OtpEngine<S>>, mailer: Arc<M>, gate: G, settings: Settings) -> Self {
        Self {
            engine,
            mailer,
            gate,
            settings,
        }
    }

    pub fn engine(&self) -> &Arc<OtpEngine<S>> {
        &self.engine
    }

    /// Issue a code for `identity` at `now` and hand it to the mailer.
    pub async fn login(&self, identity: &str, now: DateTime<Utc>) -> LoginOutcome {
        if !self.gate.admits(identity) {
            debug!(identity = %identity, "Identity refused by gate");
            return LoginOutcome::InvalidIdentity {
                reason: INVALID_IDENTITY_REASON.to_string(),
            };
        }

        let (code, attempts_remaining) = match self.engine.issue(identity, now).await {
            IssueResult::Issued {
                code,
                attempts_remaining,
            } => (code, attempts_remaining),
            IssueResult::Denied {
                reason,
                remaining_cooldown,
                attempts_remaining,
            } => {
                return LoginOutcome::Denied {
                    reason,
                    remaining_cooldown,
                    attempts_remaining,
                }
            }
            IssueResult::Failed { reason } => return LoginOutcome::Failed { reason },
        };

        let email = render_login_email(&self.settings, identity, &code);
        match self.mailer.send(&email).await {
            Ok(delivery) => LoginOutcome::Sent {
                message_id: delivery.message_id,
                attempts_remaining,
            },
            Err(e) => {
                warn!(identity = %identity, error = %e, "Login email not delivered");
                LoginOutcome::DeliveryFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Verify a submitted code after gating the identity.
    pub async fn verify(&self, identity: &str, code: &str, now: DateTime<Utc>) -> VerifyResult {
        if !self.gate.admits(identity) {
            return VerifyResult::Invalid {
                reason: INVALID_IDENTITY_REASON.to_string(),
            };
        }
        self.engine.verify(identity, code, now).await
    }

    /// [`login`](Self::login) at the engine clock's current instant.
    pub async fn login_now(&self, identity: &str) -> LoginOutcome {
        self.login(identity, self.engine.clock().now()).await
    }

    /// [`verify`](Self::verify) at the engine clock's current instant.
    pub async fn verify_now(&self, identity: &str, code: &str) -> VerifyResult {
        self.verify(identity, code, self.engine.clock().now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::login::MemoryMailer;
    use crate::otp::test_support::at;
    use crate::store::MemoryStore;

    fn contains_at(identity: &str) -> bool {
        identity.contains('@')
    }

    fn flow(mailer: MemoryMailer) -> LoginFlow<MemoryStore, MemoryMailer, fn(&str) -> bool> {
        let settings = Settings::default();
        let engine = Arc::new(OtpEngine::new(Arc::new(MemoryStore::new()), settings.otp.clone()));
        LoginFlow::new(engine, Arc::new(mailer), contains_at as fn(&str) -> bool, settings)
    }

    fn mailed_code(mailer: &MemoryMailer) -> String {
        let body = mailer.last().unwrap().text_body;
        body["Your login code is: ".len().."Your login code is: ".len() + 6].to_string()
    }

    #[tokio::test]
    async fn test_login_sends_issued_code() {
        let flow = flow(MemoryMailer::new());

        let outcome = flow.login("a@x.io", at(0)).await;
        assert_eq!(
            outcome,
            LoginOutcome::Sent {
                message_id: "memory-1".to_string(),
                attempts_remaining: 2,
            }
        );

        let code = mailed_code(&flow.mailer);
        assert_eq!(flow.engine.store().records_for("a@x.io")[0].code, code);
        assert!(flow.verify("a@x.io", &code, at(10)).await.is_valid());
    }

    #[tokio::test]
    async fn test_gate_blocks_issuance() {
        let flow = flow(MemoryMailer::new());

        let outcome = flow.login("not-an-email", at(0)).await;
        assert!(matches!(outcome, LoginOutcome::InvalidIdentity { .. }));
        assert!(flow.engine.store().is_empty());
        assert!(flow.mailer.outbox().is_empty());

        assert!(!flow.verify("not-an-email", "012345", at(0)).await.is_valid());
    }

    #[tokio::test]
    async fn test_denial_passes_through() {
        let flow = flow(MemoryMailer::new());
        flow.login("a@x.io", at(0)).await;

        let outcome = flow.login("a@x.io", at(20)).await;
        assert!(matches!(
            outcome,
            LoginOutcome::Denied {
                remaining_cooldown: Some(40),
                attempts_remaining: None,
                ..
            }
        ));
        assert_eq!(flow.mailer.outbox().len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_issuance() {
        let flow = flow(MemoryMailer::rejecting());

        let outcome = flow.login("a@x.io", at(0)).await;
        assert!(matches!(outcome, LoginOutcome::DeliveryFailed { .. }));
        assert_eq!(flow.engine.store().len(), 1);

        // The undelivered code still occupies the cooldown slot
        assert!(matches!(
            flow.login("a@x.io", at(30)).await,
            LoginOutcome::Denied { .. }
        ));
    }

    #[test]
    fn test_email_shape() {
        assert!(has_email_shape("a@x.io"));
        assert!(has_email_shape("first.last@mail.example.com"));

        assert!(!has_email_shape("ax.io"));
        assert!(!has_email_shape("a@b@x.io"));
        assert!(!has_email_shape("@x.io"));
        assert!(!has_email_shape("a@localhost"));
        assert!(!has_email_shape("a@.io"));
        assert!(!has_email_shape("a@x."));
        assert!(!has_email_shape(""));
    }

    #[test]
    fn test_email_shape_as_gate() {
        let gate = has_email_shape;
        assert!(gate.admits("a@x.io"));
        assert!(!gate.admits("not-an-email"));
    }

    #[test]
    fn test_closure_gate() {
        let gate = |identity: &str| identity.ends_with(".io");
        assert!(gate.admits("a@x.io"));
        assert!(!gate.admits("a@x.com"));
    }
}
