//! Outbound login messages and the transports that deliver them.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{OtpError, Result};

/// A rendered login message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub sender: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
}

/// Receipt for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub message_id: String,
}

/// Trait for mail transports.
///
/// A transport returns `Err(OtpError::Mail)` when the message was not
/// accepted for delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<Delivery>;
}

/// Render the login message carrying `code` for `identity`.
pub fn render_login_email(settings: &Settings, identity: &str, code: &str) -> OutboundEmail {
    let minutes = (settings.otp.code_ttl_secs + 59) / 60;
    let unit = if minutes == 1 { "minute" } else { "minutes" };

    OutboundEmail {
        sender: settings.mail.sender.clone(),
        to: vec![identity.to_string()],
        subject: settings.mail.subject.clone(),
        text_body: format!(
            "Your login code is: {}\n\nThis code will expire in {} {}.\n\n\
             If you didn't request this code, please ignore this email.",
            code, minutes, unit
        ),
    }
}

/// Writes messages to the log instead of sending them.
///
/// Intended for local development; the passcode ends up in the log output.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<Delivery> {
        let message_id = Uuid::new_v4().to_string();
        info!(
            message_id = %message_id,
            to = ?email.to,
            subject = %email.subject,
            body = %email.text_body,
            "Login email"
        );
        Ok(Delivery { message_id })
    }
}

/// Keeps every accepted message in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<OutboundEmail>>,
    reject: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that refuses every message.
    pub fn rejecting() -> Self {
        Self {
            outbox: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    /// Messages accepted so far, oldest first.
    pub fn outbox(&self) -> Vec<OutboundEmail> {
        self.outbox.lock().clone()
    }

    /// The most recently accepted message.
    pub fn last(&self) -> Option<OutboundEmail> {
        self.outbox.lock().last().cloned()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<Delivery> {
        if self.reject {
            return Err(OtpError::Mail("Failed to send email".to_string()));
        }
        let mut outbox = self.outbox.lock();
        outbox.push(email.clone());
        Ok(Delivery {
            message_id: format!("memory-{}", outbox.len()),
        })
    }
}
