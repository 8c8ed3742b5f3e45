//! Otpgate - One-Time Passcode Service
//!
//! This crate issues and verifies short-lived numeric one-time passcodes
//! for passwordless email login. Issuance is rate limited per identity
//! with a cooldown window and an hourly budget, both derived on demand
//! from the persisted issuance history.

pub mod clock;
pub mod config;
pub mod console;
pub mod error;
pub mod login;
pub mod otp;
pub mod store;
