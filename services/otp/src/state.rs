use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::domain::types::OtpPolicy;
use crate::infra::db::{DbOtpRepository, DbSubjectRepository};
use crate::infra::notifier::MailNotifier;
use crate::usecase::code::{CodeGenerator, CodeHasher};
use crate::usecase::lock::IssueLocks;
use crate::usecase::otp::{InvalidateOtpUseCase, IssueOtpUseCase, VerifyOtpUseCase};

/// Shared application state passed to every handler via axum `State`.
///
/// The generator is seeded once when the state is built and shared by every
/// request.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub generator: Arc<CodeGenerator>,
    pub hasher: CodeHasher,
    pub locks: IssueLocks,
    pub notifier: MailNotifier,
    pub policy: OtpPolicy,
}

impl AppState {
    pub fn subject_repo(&self) -> DbSubjectRepository {
        DbSubjectRepository {
            db: self.db.clone(),
        }
    }

    pub fn otp_repo(&self) -> DbOtpRepository {
        DbOtpRepository {
            db: self.db.clone(),
        }
    }

    pub fn issue_usecase(
        &self,
    ) -> IssueOtpUseCase<DbSubjectRepository, DbOtpRepository, MailNotifier> {
        IssueOtpUseCase {
            subjects: self.subject_repo(),
            otps: self.otp_repo(),
            notifier: self.notifier.clone(),
            generator: Arc::clone(&self.generator),
            hasher: self.hasher.clone(),
            locks: self.locks.clone(),
            policy: self.policy,
        }
    }

    pub fn verify_usecase(&self) -> VerifyOtpUseCase<DbSubjectRepository, DbOtpRepository> {
        VerifyOtpUseCase {
            subjects: self.subject_repo(),
            otps: self.otp_repo(),
            hasher: self.hasher.clone(),
            policy: self.policy,
        }
    }

    pub fn invalidate_usecase(&self) -> InvalidateOtpUseCase<DbOtpRepository> {
        InvalidateOtpUseCase {
            otps: self.otp_repo(),
            policy: self.policy,
        }
    }
}
