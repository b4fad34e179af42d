use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select,
};
use uuid::Uuid;

use otpguard_otp_schema::{otp_codes, users};

use crate::domain::repository::{OtpRepository, SubjectPort};
use crate::domain::types::{OtpRecord, Subject, SubjectStatus};
use crate::error::OtpServiceError;

// ── OTP repository ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbOtpRepository {
    pub db: DatabaseConnection,
}

fn for_pair(subject_id: Uuid, purpose: &str) -> Select<otp_codes::Entity> {
    otp_codes::Entity::find()
        .filter(otp_codes::Column::UserId.eq(subject_id))
        .filter(otp_codes::Column::Purpose.eq(purpose))
}

impl OtpRepository for DbOtpRepository {
    async fn create(&self, record: &OtpRecord) -> Result<(), OtpServiceError> {
        otp_codes::ActiveModel {
            id: Set(record.id),
            user_id: Set(record.subject_id),
            purpose: Set(record.purpose.clone()),
            code_hash: Set(record.code_hash.clone()),
            expires_at: Set(record.expires_at),
            consumed: Set(record.consumed),
            created_at: Set(record.created_at),
        }
        .insert(&self.db)
        .await
        .map_err(|e| OtpServiceError::store(e, "create otp"))?;
        Ok(())
    }

    async fn find_latest(
        &self,
        subject_id: Uuid,
        purpose: &str,
    ) -> Result<Option<OtpRecord>, OtpServiceError> {
        let model = for_pair(subject_id, purpose)
            .order_by_desc(otp_codes::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(|e| OtpServiceError::store(e, "find latest otp"))?;
        Ok(model.map(otp_from_model))
    }

    async fn count_since(
        &self,
        subject_id: Uuid,
        purpose: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, OtpServiceError> {
        let count = for_pair(subject_id, purpose)
            .filter(otp_codes::Column::CreatedAt.gte(since))
            .count(&self.db)
            .await
            .map_err(|e| OtpServiceError::store(e, "count recent otps"))?;
        Ok(count)
    }

    async fn list_newest_first(
        &self,
        subject_id: Uuid,
        purpose: &str,
    ) -> Result<Vec<OtpRecord>, OtpServiceError> {
        let models = for_pair(subject_id, purpose)
            .order_by_desc(otp_codes::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| OtpServiceError::store(e, "list otps"))?;
        Ok(models.into_iter().map(otp_from_model).collect())
    }

    async fn mark_consumed(&self, id: Uuid) -> Result<bool, OtpServiceError> {
        // Conditional on consumed = false so only one caller wins the flip.
        let result = otp_codes::Entity::update_many()
            .col_expr(otp_codes::Column::Consumed, Expr::value(true))
            .filter(otp_codes::Column::Id.eq(id))
            .filter(otp_codes::Column::Consumed.eq(false))
            .exec(&self.db)
            .await
            .map_err(|e| OtpServiceError::store(e, "mark otp consumed"))?;
        Ok(result.rows_affected == 1)
    }

    async fn delete_all(&self, subject_id: Uuid, purpose: &str) -> Result<u64, OtpServiceError> {
        let result = otp_codes::Entity::delete_many()
            .filter(otp_codes::Column::UserId.eq(subject_id))
            .filter(otp_codes::Column::Purpose.eq(purpose))
            .exec(&self.db)
            .await
            .map_err(|e| OtpServiceError::store(e, "delete otps"))?;
        Ok(result.rows_affected)
    }
}

fn otp_from_model(model: otp_codes::Model) -> OtpRecord {
    OtpRecord {
        id: model.id,
        subject_id: model.user_id,
        purpose: model.purpose,
        code_hash: model.code_hash,
        created_at: model.created_at,
        expires_at: model.expires_at,
        consumed: model.consumed,
    }
}

// ── Subject repository ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbSubjectRepository {
    pub db: DatabaseConnection,
}

impl SubjectPort for DbSubjectRepository {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Subject>, OtpServiceError> {
        let model = users::Entity::find()
            .filter(users::Column::Email.eq(identifier))
            .one(&self.db)
            .await
            .map_err(|e| OtpServiceError::store(e, "find user by email"))?;
        Ok(model.map(subject_from_model))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subject>, OtpServiceError> {
        let model = users::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| OtpServiceError::store(e, "find user by id"))?;
        Ok(model.map(subject_from_model))
    }

    async fn mark_active(&self, id: Uuid) -> Result<(), OtpServiceError> {
        users::Entity::update_many()
            .col_expr(
                users::Column::Status,
                Expr::value(SubjectStatus::Active.as_str()),
            )
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await
            .map_err(|e| OtpServiceError::store(e, "mark user active"))?;
        Ok(())
    }
}

fn subject_from_model(model: users::Model) -> Subject {
    Subject {
        id: model.id,
        status: SubjectStatus::parse(&model.status),
        email: model.email,
    }
}
