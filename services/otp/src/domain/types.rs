use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::OtpServiceError;

/// Number of decimal digits in an issued code.
pub const OTP_LEN: usize = 6;

/// Longest accepted purpose tag.
pub const PURPOSE_MAX_LEN: usize = 32;

/// Account state as far as OTP verification is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectStatus {
    Pending,
    Active,
}

impl SubjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
        }
    }

    /// Unknown values are treated as pending so they can still be activated.
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            _ => Self::Pending,
        }
    }
}

/// The account an OTP is issued to. Owned by the users table, read-only here
/// apart from the activation flip.
#[derive(Debug, Clone)]
pub struct Subject {
    pub id: Uuid,
    pub email: String,
    pub status: SubjectStatus,
}

/// How a caller names the subject of an OTP operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectKey {
    Id(Uuid),
    /// Contact identifier, currently the email address.
    Identifier(String),
}

/// Stored OTP record. `code_hash` is an Argon2 PHC string, never the code.
#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub purpose: String,
    pub code_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl OtpRecord {
    /// Eligible for verification: unconsumed and younger than `validity`.
    ///
    /// Age is measured from `created_at`; `expires_at` is derived from it and
    /// not consulted, so a skewed stored expiry cannot extend a code's life.
    /// A `created_at` in the future has no meaningful age and is never eligible.
    pub fn is_eligible(&self, now: DateTime<Utc>, validity: Duration) -> bool {
        let age = now - self.created_at;
        !self.consumed && age >= Duration::zero() && age <= validity
    }
}

/// What `Issue` hands back to an in-process caller.
///
/// `code` is the plaintext; it must not be logged or persisted.
#[derive(Debug, Clone)]
pub struct IssuedOtp {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub purpose: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Timing knobs for issuance, verification and storage calls.
#[derive(Debug, Clone, Copy)]
pub struct OtpPolicy {
    /// How long a code stays valid after issuance.
    pub validity: Duration,
    /// Minimum spacing between two issuances for the same pair.
    pub cooldown: Duration,
    /// Trailing window counted by the rolling cap.
    pub cap_window: Duration,
    /// Issuances inside `cap_window` that engage the penalty.
    pub cap_max: u64,
    /// Wait imposed after the latest issuance once the cap is reached.
    pub cap_penalty: Duration,
    /// Upper bound for any single storage call.
    pub store_timeout: std::time::Duration,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            validity: Duration::minutes(5),
            cooldown: Duration::seconds(60),
            cap_window: Duration::hours(24),
            cap_max: 5,
            cap_penalty: Duration::minutes(15),
            store_timeout: std::time::Duration::from_secs(2),
        }
    }
}

/// Check a purpose tag: 1..=32 chars of `[a-z0-9_-]`.
pub fn validate_purpose(purpose: &str) -> Result<(), OtpServiceError> {
    if purpose.is_empty() {
        return Err(OtpServiceError::Validation(
            "purpose must not be empty".to_owned(),
        ));
    }
    if purpose.len() > PURPOSE_MAX_LEN {
        return Err(OtpServiceError::Validation(format!(
            "purpose must be at most {PURPOSE_MAX_LEN} characters"
        )));
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-';
    if !purpose.chars().all(allowed) {
        return Err(OtpServiceError::Validation(
            "purpose may only contain lowercase letters, digits, '-' and '_'".to_owned(),
        ));
    }
    Ok(())
}
