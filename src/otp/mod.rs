//! Passcode lifecycle: generation, rate limiting, issuance, verification
//! and purging.

mod code;
mod engine;
mod issuer;
mod janitor;
mod limiter;
mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use code::{generate_code, generate_code_with, is_well_formed, CODE_LENGTH};
pub use engine::OtpEngine;
pub use issuer::{IssueResult, Issuer};
pub use janitor::Janitor;
pub use limiter::{remaining_cooldown, RateLimitDecision, RateLimiter};
pub use verifier::{VerifyResult, Verifier, INVALID_REASON};
