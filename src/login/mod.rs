//! Login flow around the passcode engine: identity gating, message
//! rendering and handing the code to a mail transport.

mod flow;
mod mailer;

pub use flow::{has_email_shape, IdentityGate, LoginFlow, LoginOutcome};
pub use mailer::{render_login_email, Delivery, LogMailer, Mailer, MemoryMailer, OutboundEmail};
