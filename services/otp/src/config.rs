use anyhow::{Context as _, bail};
use chrono::Duration;
use serde::Deserialize;

use otpguard_core::config::Config;

use crate::domain::types::OtpPolicy;
use crate::usecase::code::HashCost;

/// OTP service configuration loaded from environment variables.
///
/// Only `DATABASE_URL` is required; the OTP windows default to
/// 5 min validity, 60 s cool-down and a 5-per-24 h cap with a 15 min penalty.
#[derive(Debug, Deserialize)]
pub struct OtpConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// TCP port to listen on. Env var: `OTP_PORT`.
    #[serde(default = "default_port")]
    pub otp_port: u16,
    #[serde(default = "default_ttl_secs")]
    pub otp_ttl_secs: i64,
    #[serde(default = "default_cooldown_secs")]
    pub otp_cooldown_secs: i64,
    #[serde(default = "default_cap_window_secs")]
    pub otp_cap_window_secs: i64,
    #[serde(default = "default_cap_max")]
    pub otp_cap_max: u64,
    #[serde(default = "default_cap_penalty_secs")]
    pub otp_cap_penalty_secs: i64,
    /// Per storage call, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub otp_store_timeout_ms: u64,
    #[serde(default = "default_hash_memory_kib")]
    pub otp_hash_memory_kib: u32,
    #[serde(default = "default_hash_iterations")]
    pub otp_hash_iterations: u32,
    #[serde(default = "default_hash_parallelism")]
    pub otp_hash_parallelism: u32,
    /// Server-side secret mixed into every code hash.
    pub otp_hash_pepper: Option<String>,
    /// HTTP mail relay endpoint. Unset disables delivery.
    pub mail_relay_url: Option<String>,
    #[serde(default = "default_mail_from")]
    pub mail_from: String,
}

impl Config for OtpConfig {}

fn default_port() -> u16 {
    3120
}
fn default_ttl_secs() -> i64 {
    5 * 60
}
fn default_cooldown_secs() -> i64 {
    60
}
fn default_cap_window_secs() -> i64 {
    24 * 60 * 60
}
fn default_cap_max() -> u64 {
    5
}
fn default_cap_penalty_secs() -> i64 {
    15 * 60
}
fn default_store_timeout_ms() -> u64 {
    2_000
}
fn default_hash_memory_kib() -> u32 {
    HashCost::default().memory_kib
}
fn default_hash_iterations() -> u32 {
    HashCost::default().iterations
}
fn default_hash_parallelism() -> u32 {
    HashCost::default().parallelism
}
fn default_mail_from() -> String {
    "no-reply@localhost".to_owned()
}

impl OtpConfig {
    /// Rejects windows that are negative, out of range, or zero where a zero
    /// window would disable the check. A zero cool-down is allowed.
    pub fn policy(&self) -> anyhow::Result<OtpPolicy> {
        if self.otp_store_timeout_ms == 0 {
            bail!("OTP_STORE_TIMEOUT_MS must be positive");
        }
        if self.otp_cap_max == 0 {
            bail!("OTP_CAP_MAX must be positive");
        }
        Ok(OtpPolicy {
            validity: window("OTP_TTL_SECS", self.otp_ttl_secs, false)?,
            cooldown: window("OTP_COOLDOWN_SECS", self.otp_cooldown_secs, true)?,
            cap_window: window("OTP_CAP_WINDOW_SECS", self.otp_cap_window_secs, false)?,
            cap_max: self.otp_cap_max,
            cap_penalty: window("OTP_CAP_PENALTY_SECS", self.otp_cap_penalty_secs, false)?,
            store_timeout: std::time::Duration::from_millis(self.otp_store_timeout_ms),
        })
    }

    pub fn hash_cost(&self) -> HashCost {
        HashCost {
            memory_kib: self.otp_hash_memory_kib,
            iterations: self.otp_hash_iterations,
            parallelism: self.otp_hash_parallelism,
        }
    }
}

fn window(name: &str, secs: i64, allow_zero: bool) -> anyhow::Result<Duration> {
    if secs < 0 || (secs == 0 && !allow_zero) {
        bail!("{name} must be positive, got {secs}");
    }
    Duration::try_seconds(secs).with_context(|| format!("{name} out of range: {secs}"))
}
