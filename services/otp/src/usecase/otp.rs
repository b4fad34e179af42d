use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::repository::{Notifier, OtpRepository, SubjectPort};
use crate::domain::types::{
    IssuedOtp, OTP_LEN, OtpPolicy, OtpRecord, SubjectKey, validate_purpose,
};
use crate::error::OtpServiceError;
use crate::usecase::code::{CodeGenerator, CodeHasher};
use crate::usecase::lock::IssueLocks;
use crate::usecase::rate_limit::RateLimiter;
use crate::usecase::{bounded, resolve_subject};

const OTP_MAIL_SUBJECT: &str = "Your OTP Code";

fn otp_mail_body(email: &str, code: &str, policy: &OtpPolicy) -> String {
    format!(
        "Hello {email},\n\nYour OTP code is: {code}\n\nThis code will expire in {} minutes.\n\nIf you did not request this, please ignore.",
        policy.validity.num_minutes()
    )
}

/// Hand the code to the notifier on its own task. Failures are logged, never
/// returned; the issued code stays valid either way.
fn dispatch_notification<N: Notifier>(
    notifier: N,
    destination: String,
    body: String,
    record_id: Uuid,
) {
    tokio::spawn(async move {
        match notifier.send(&destination, OTP_MAIL_SUBJECT, &body).await {
            Ok(()) => tracing::debug!(%record_id, "otp notification delivered"),
            Err(e) => tracing::warn!(%record_id, error = %e, "failed to deliver otp notification"),
        }
    });
}

// ── IssueOtp ─────────────────────────────────────────────────────────────────

pub struct IssueOtpInput {
    pub subject: SubjectKey,
    pub purpose: String,
}

pub struct IssueOtpUseCase<S, O, N>
where
    S: SubjectPort,
    O: OtpRepository,
    N: Notifier,
{
    pub subjects: S,
    pub otps: O,
    pub notifier: N,
    pub generator: Arc<CodeGenerator>,
    pub hasher: CodeHasher,
    pub locks: IssueLocks,
    pub policy: OtpPolicy,
}

impl<S, O, N> IssueOtpUseCase<S, O, N>
where
    S: SubjectPort,
    O: OtpRepository,
    N: Notifier,
{
    pub async fn execute(&self, input: IssueOtpInput) -> Result<IssuedOtp, OtpServiceError> {
        validate_purpose(&input.purpose)?;
        let timeout = self.policy.store_timeout;

        // 1. Resolve subject → 404 if unknown
        let subject = resolve_subject(&self.subjects, &input.subject, timeout).await?;
        if subject.email.trim().is_empty() {
            return Err(OtpServiceError::Validation("user email is empty".to_owned()));
        }

        // 2. Rate limit under the pair lock, held until the record is visible
        let guard = self.locks.acquire(subject.id, &input.purpose).await;
        RateLimiter::new(self.policy)
            .check(&self.otps, subject.id, &input.purpose, Utc::now())
            .await?;

        // 3. Generate + hash
        let code = self.generator.generate();
        let code_hash = self.hasher.hash_blocking(code.clone()).await?;
        let created_at = Utc::now();
        let record = OtpRecord {
            id: Uuid::now_v7(),
            subject_id: subject.id,
            purpose: input.purpose,
            code_hash,
            created_at,
            expires_at: created_at + self.policy.validity,
            consumed: false,
        };

        // 4. Persist; nothing is sent unless this succeeds
        bounded(timeout, "create otp", self.otps.create(&record)).await?;
        drop(guard);

        tracing::info!(
            subject_id = %subject.id,
            purpose = %record.purpose,
            otp_id = %record.id,
            expires_at = %record.expires_at,
            "otp issued"
        );

        // 5. Fire-and-forget delivery
        let body = otp_mail_body(&subject.email, &code, &self.policy);
        dispatch_notification(self.notifier.clone(), subject.email, body, record.id);

        Ok(IssuedOtp {
            id: record.id,
            subject_id: record.subject_id,
            purpose: record.purpose,
            code,
            expires_at: record.expires_at,
        })
    }
}

// ── VerifyOtp ────────────────────────────────────────────────────────────────

pub struct VerifyOtpInput {
    pub subject: SubjectKey,
    pub purpose: String,
    pub code: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedOtp {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub purpose: String,
}

pub struct VerifyOtpUseCase<S, O>
where
    S: SubjectPort,
    O: OtpRepository,
{
    pub subjects: S,
    pub otps: O,
    pub hasher: CodeHasher,
    pub policy: OtpPolicy,
}

impl<S, O> VerifyOtpUseCase<S, O>
where
    S: SubjectPort,
    O: OtpRepository,
{
    /// Match `code` against the pair's eligible records, newest first.
    ///
    /// Wrong, expired and already-consumed codes all fail with the same
    /// `InvalidOtp`.
    pub async fn execute(&self, input: VerifyOtpInput) -> Result<VerifiedOtp, OtpServiceError> {
        validate_purpose(&input.purpose)?;
        let timeout = self.policy.store_timeout;

        let subject = resolve_subject(&self.subjects, &input.subject, timeout).await?;

        let records = bounded(
            timeout,
            "list otps",
            self.otps.list_newest_first(subject.id, &input.purpose),
        )
        .await?;
        if records.is_empty() {
            return Err(OtpServiceError::NoOtpFound);
        }

        let well_formed =
            input.code.len() == OTP_LEN && input.code.bytes().all(|b| b.is_ascii_digit());
        let now = Utc::now();
        let mut compared = false;

        if well_formed {
            for record in records
                .iter()
                .filter(|r| r.is_eligible(now, self.policy.validity))
            {
                compared = true;
                let matched = self
                    .hasher
                    .verify_blocking(input.code.clone(), record.code_hash.clone())
                    .await?;
                if !matched {
                    continue;
                }

                // Activate before consuming; a failed activation leaves the code retryable.
                bounded(timeout, "activate subject", self.subjects.mark_active(subject.id))
                    .await?;
                // A concurrent verify may have consumed it first.
                let flipped =
                    bounded(timeout, "mark otp consumed", self.otps.mark_consumed(record.id))
                        .await?;
                if !flipped {
                    return Err(OtpServiceError::InvalidOtp);
                }

                tracing::info!(
                    subject_id = %subject.id,
                    purpose = %record.purpose,
                    otp_id = %record.id,
                    "otp verified"
                );
                return Ok(VerifiedOtp {
                    id: record.id,
                    subject_id: subject.id,
                    purpose: record.purpose.clone(),
                });
            }
        }

        if !compared {
            self.hasher.verify_decoy_blocking(input.code).await?;
        }
        Err(OtpServiceError::InvalidOtp)
    }
}

// ── InvalidateOtp ────────────────────────────────────────────────────────────

pub struct InvalidateOtpInput {
    pub subject_id: Uuid,
    pub purpose: String,
}

pub struct InvalidateOtpUseCase<O: OtpRepository> {
    pub otps: O,
    pub policy: OtpPolicy,
}

impl<O: OtpRepository> InvalidateOtpUseCase<O> {
    /// Delete every record for the pair. Zero records is not an error.
    pub async fn execute(&self, input: InvalidateOtpInput) -> Result<u64, OtpServiceError> {
        validate_purpose(&input.purpose)?;
        let removed = bounded(
            self.policy.store_timeout,
            "delete otps",
            self.otps.delete_all(input.subject_id, &input.purpose),
        )
        .await?;
        tracing::info!(
            subject_id = %input.subject_id,
            purpose = %input.purpose,
            removed,
            "otps invalidated"
        );
        Ok(removed)
    }
}
