use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use otpguard_core::serde::to_rfc3339_ms;

use crate::domain::types::SubjectKey;
use crate::error::OtpServiceError;
use crate::state::AppState;
use crate::usecase::otp::{InvalidateOtpInput, IssueOtpInput, VerifyOtpInput};

/// Subject reference accepted by the OTP endpoints: `user_id` wins over `email`.
#[derive(Debug, Deserialize)]
pub struct SubjectRef {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
}

impl SubjectRef {
    fn into_key(self) -> Result<SubjectKey, OtpServiceError> {
        match (self.user_id, self.email) {
            (Some(id), _) => Ok(SubjectKey::Id(id)),
            (None, Some(email)) => Ok(SubjectKey::Identifier(email)),
            (None, None) => Err(OtpServiceError::Validation(
                "either user_id or email is required".to_owned(),
            )),
        }
    }
}

#[derive(Deserialize)]
pub struct IssueOtpRequest {
    #[serde(flatten)]
    pub subject: SubjectRef,
    pub purpose: String,
}

#[derive(Debug, Serialize)]
pub struct IssueOtpResponse {
    pub id: Uuid,
    pub purpose: String,
    #[serde(serialize_with = "to_rfc3339_ms")]
    pub expires_at: DateTime<Utc>,
}

/// `POST /otp`: issue a code and send it out of band. The code itself is
/// never part of the response.
pub async fn issue_otp(
    State(state): State<AppState>,
    Json(body): Json<IssueOtpRequest>,
) -> Result<(StatusCode, Json<IssueOtpResponse>), OtpServiceError> {
    let issued = state
        .issue_usecase()
        .execute(IssueOtpInput {
            subject: body.subject.into_key()?,
            purpose: body.purpose,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(IssueOtpResponse {
            id: issued.id,
            purpose: issued.purpose,
            expires_at: issued.expires_at,
        }),
    ))
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(flatten)]
    pub subject: SubjectRef,
    pub purpose: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub verified: bool,
}

/// `POST /otp/verify`
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, OtpServiceError> {
    state
        .verify_usecase()
        .execute(VerifyOtpInput {
            subject: body.subject.into_key()?,
            purpose: body.purpose,
            code: body.code,
        })
        .await?;
    Ok(Json(VerifyOtpResponse { verified: true }))
}

/// `DELETE /otp/{user_id}/{purpose}`. Idempotent.
pub async fn invalidate_otp(
    State(state): State<AppState>,
    Path((subject_id, purpose)): Path<(Uuid, String)>,
) -> Result<StatusCode, OtpServiceError> {
    state
        .invalidate_usecase()
        .execute(InvalidateOtpInput {
            subject_id,
            purpose,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
