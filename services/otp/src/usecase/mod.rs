pub mod code;
pub mod lock;
pub mod otp;
pub mod rate_limit;

use std::future::Future;
use std::time::Duration;

use crate::domain::repository::SubjectPort;
use crate::domain::types::{Subject, SubjectKey};
use crate::error::OtpServiceError;

/// Await a storage call, failing with `Store` once `limit` passes.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, OtpServiceError>
where
    F: Future<Output = Result<T, OtpServiceError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(OtpServiceError::store(
            anyhow::anyhow!("timed out after {limit:?}"),
            operation,
        )),
    }
}

/// Look the subject up by id or contact identifier → `UserNotFound` if absent.
pub(crate) async fn resolve_subject<S: SubjectPort>(
    subjects: &S,
    key: &SubjectKey,
    limit: Duration,
) -> Result<Subject, OtpServiceError> {
    let found = match key {
        SubjectKey::Id(id) => bounded(limit, "find subject by id", subjects.find_by_id(*id)).await?,
        SubjectKey::Identifier(identifier) => {
            let identifier = identifier.trim();
            if identifier.is_empty() {
                return Err(OtpServiceError::Validation(
                    "identifier must not be empty".to_owned(),
                ));
            }
            bounded(
                limit,
                "find subject by identifier",
                subjects.find_by_identifier(identifier),
            )
            .await?
        }
    };
    found.ok_or(OtpServiceError::UserNotFound)
}
