//! Configuration management for otpgate.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{OtpError, Result};

/// Prefix for environment variable overrides, e.g. `OTPGATE__OTP__COOLDOWN_SECS`.
const ENV_PREFIX: &str = "OTPGATE";

/// Upper bound for any policy duration (100 years). Instants shifted by a
/// policy duration must stay inside chrono's representable range.
pub const MAX_POLICY_SECS: u64 = 100 * 365 * 24 * 3600;

/// Main configuration for the otpgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Passcode lifecycle and rate limiting policy
    #[serde(default)]
    pub otp: OtpPolicy,

    /// Expired record maintenance
    #[serde(default)]
    pub janitor: JanitorConfig,

    /// Login message rendering
    #[serde(default)]
    pub mail: MailConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Passcode lifecycle and rate limiting policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpPolicy {
    /// How long an issued code stays valid
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: u64,

    /// Minimum spacing between two issuances for the same identity
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Maximum issuances per identity inside the budget window
    #[serde(default = "default_hourly_limit")]
    pub hourly_limit: u32,

    /// Length of the rolling budget window
    #[serde(default = "default_budget_window")]
    pub budget_window_secs: u64,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            code_ttl_secs: default_code_ttl(),
            cooldown_secs: default_cooldown(),
            hourly_limit: default_hourly_limit(),
            budget_window_secs: default_budget_window(),
        }
    }
}

impl OtpPolicy {
    pub fn code_ttl(&self) -> Duration {
        Duration::seconds(self.code_ttl_secs as i64)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::seconds(self.cooldown_secs as i64)
    }

    pub fn budget_window(&self) -> Duration {
        Duration::seconds(self.budget_window_secs as i64)
    }
}

fn default_code_ttl() -> u64 {
    300
}

fn default_cooldown() -> u64 {
    60
}

fn default_hourly_limit() -> u32 {
    3
}

fn default_budget_window() -> u64 {
    3600
}

/// Janitor scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JanitorConfig {
    /// Whether the binary schedules periodic purges
    #[serde(default = "default_janitor_enabled")]
    pub enabled: bool,

    /// Seconds between purges
    #[serde(default = "default_janitor_interval")]
    pub interval_secs: u64,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_janitor_enabled(),
            interval_secs: default_janitor_interval(),
        }
    }
}

fn default_janitor_enabled() -> bool {
    true
}

fn default_janitor_interval() -> u64 {
    60
}

/// Login message rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Envelope sender of login messages
    #[serde(default = "default_sender")]
    pub sender: String,

    /// Subject line of login messages
    #[serde(default = "default_subject")]
    pub subject: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: default_sender(),
            subject: default_subject(),
        }
    }
}

fn default_sender() -> String {
    "noreply@sokushuu.de".to_string()
}

fn default_subject() -> String {
    "Your Sokushuu Login Code".to_string()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    /// Parse settings from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(yaml)
            .map_err(|e| OtpError::Config(format!("Failed to parse settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from an optional YAML file layered under
    /// `OTPGATE__SECTION__KEY` environment overrides.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let path = path.as_ref();
            info!(path = %path.display(), "Loading settings");
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Yaml),
            );
        }

        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject policies that would make the limiter meaningless.
    pub fn validate(&self) -> Result<()> {
        let otp = &self.otp;
        for (key, secs) in [
            ("otp.code_ttl_secs", otp.code_ttl_secs),
            ("otp.cooldown_secs", otp.cooldown_secs),
            ("otp.budget_window_secs", otp.budget_window_secs),
        ] {
            if secs > MAX_POLICY_SECS {
                return Err(OtpError::Config(format!(
                    "{} must not exceed {} seconds",
                    key, MAX_POLICY_SECS
                )));
            }
        }
        if otp.code_ttl_secs == 0 {
            return Err(OtpError::Config("otp.code_ttl_secs must be positive".into()));
        }
        if otp.cooldown_secs == 0 {
            return Err(OtpError::Config("otp.cooldown_secs must be positive".into()));
        }
        if otp.hourly_limit == 0 {
            return Err(OtpError::Config("otp.hourly_limit must be positive".into()));
        }
        if otp.budget_window_secs < otp.cooldown_secs {
            return Err(OtpError::Config(
                "otp.budget_window_secs must not be shorter than otp.cooldown_secs".into(),
            ));
        }
        if self.janitor.enabled && self.janitor.interval_secs == 0 {
            return Err(OtpError::Config("janitor.interval_secs must be positive".into()));
        }
        Ok(())
    }
}
