//! Issuance rate limiting derived from OTP history.
//!
//! No counters are kept; every check reads the latest record and the count of
//! records in the trailing cap window for the (subject, purpose) pair.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::repository::OtpRepository;
use crate::domain::types::OtpPolicy;
use crate::error::OtpServiceError;
use crate::usecase::bounded;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Latest issuance is inside the cool-down.
    Cooldown,
    /// Cap reached and the penalty after the latest issuance is still running.
    CapReached { wait_minutes: i64 },
}

impl RateLimitDecision {
    pub fn into_result(self) -> Result<(), OtpServiceError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Cooldown => Err(OtpServiceError::CooldownActive),
            Self::CapReached { wait_minutes } => {
                Err(OtpServiceError::RequestLimitReached { wait_minutes })
            }
        }
    }
}

/// Decide whether a new code may be issued.
///
/// `latest` is the creation time of the newest record for the pair and
/// `recent_count` the number of records inside `policy.cap_window`.
/// The cap only blocks while `policy.cap_penalty` has not elapsed since
/// `latest`; after that issuance is allowed again whatever the count.
pub fn evaluate(
    latest: Option<DateTime<Utc>>,
    recent_count: u64,
    now: DateTime<Utc>,
    policy: &OtpPolicy,
) -> RateLimitDecision {
    let Some(latest) = latest else {
        return RateLimitDecision::Allowed;
    };
    let elapsed = now - latest;

    if elapsed < policy.cooldown {
        return RateLimitDecision::Cooldown;
    }

    if recent_count >= policy.cap_max && elapsed < policy.cap_penalty {
        let remaining = policy.cap_penalty - elapsed;
        return RateLimitDecision::CapReached {
            wait_minutes: ceil_minutes(remaining),
        };
    }

    RateLimitDecision::Allowed
}

/// Whole minutes, rounded up, never below one.
fn ceil_minutes(d: Duration) -> i64 {
    let ms = d.num_milliseconds().max(0);
    ((ms + 59_999) / 60_000).max(1)
}

/// Store-backed limiter for one policy.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    pub policy: OtpPolicy,
}

impl RateLimiter {
    pub fn new(policy: OtpPolicy) -> Self {
        Self { policy }
    }

    /// Run the cool-down then the rolling cap against the store.
    pub async fn check<O: OtpRepository>(
        &self,
        otps: &O,
        subject_id: Uuid,
        purpose: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OtpServiceError> {
        let timeout = self.policy.store_timeout;
        let latest = bounded(
            timeout,
            "find latest otp",
            otps.find_latest(subject_id, purpose),
        )
        .await?
        .map(|r| r.created_at);

        // A fresh pair needs no count.
        let Some(latest_at) = latest else {
            return Ok(());
        };
        if evaluate(Some(latest_at), 0, now, &self.policy) == RateLimitDecision::Cooldown {
            tracing::debug!(%subject_id, purpose, "otp issuance in cool-down");
            return Err(OtpServiceError::CooldownActive);
        }

        let since = now - self.policy.cap_window;
        let recent = bounded(
            timeout,
            "count recent otps",
            otps.count_since(subject_id, purpose, since),
        )
        .await?;

        let decision = evaluate(Some(latest_at), recent, now, &self.policy);
        if decision != RateLimitDecision::Allowed {
            tracing::debug!(%subject_id, purpose, recent, "otp issuance cap reached");
        }
        decision.into_result()
    }
}
