#![allow(async_fn_in_trait)]

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::types::{OtpRecord, Subject};
use crate::error::OtpServiceError;

/// Port for looking up and activating the accounts OTPs are issued to.
pub trait SubjectPort: Send + Sync {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Subject>, OtpServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subject>, OtpServiceError>;

    /// Move the subject to `active`. Called once per successful verification.
    async fn mark_active(&self, id: Uuid) -> Result<(), OtpServiceError>;
}

/// Repository for issued OTP records, keyed by (subject, purpose).
pub trait OtpRepository: Send + Sync {
    async fn create(&self, record: &OtpRecord) -> Result<(), OtpServiceError>;

    /// Most recently created record for the pair, consumed or not.
    async fn find_latest(
        &self,
        subject_id: Uuid,
        purpose: &str,
    ) -> Result<Option<OtpRecord>, OtpServiceError>;

    /// Number of records for the pair created at or after `since`.
    async fn count_since(
        &self,
        subject_id: Uuid,
        purpose: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, OtpServiceError>;

    /// Every record for the pair, newest first.
    async fn list_newest_first(
        &self,
        subject_id: Uuid,
        purpose: &str,
    ) -> Result<Vec<OtpRecord>, OtpServiceError>;

    /// Flip `consumed` to true if it is still false.
    /// Returns `true` only for the call that performed the flip.
    async fn mark_consumed(&self, id: Uuid) -> Result<bool, OtpServiceError>;

    /// Delete every record for the pair. Returns the number removed.
    async fn delete_all(&self, subject_id: Uuid, purpose: &str) -> Result<u64, OtpServiceError>;
}

/// Out-of-band delivery of a code. Runs inside a spawned task, so the
/// returned future must be `Send`.
pub trait Notifier: Clone + Send + Sync + 'static {
    fn send(
        &self,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), OtpServiceError>> + Send;
}
