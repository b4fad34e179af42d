use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// OTP service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum OtpServiceError {
    #[error("user not found")]
    UserNotFound,
    #[error("too many requests, please wait before requesting another code")]
    CooldownActive,
    #[error(
        "you have reached the maximum otp request limit, please wait {wait_minutes} minutes to request again"
    )]
    RequestLimitReached { wait_minutes: i64 },
    #[error("{0}")]
    Validation(String),
    #[error("no otp found")]
    NoOtpFound,
    #[error("invalid or expired otp")]
    InvalidOtp,
    #[error("storage unavailable")]
    Store(#[source] anyhow::Error),
    #[error("otp delivery failed")]
    Delivery(#[source] anyhow::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl OtpServiceError {
    /// Wrap a persistence-layer failure with the name of the operation that failed.
    pub fn store(err: impl Into<anyhow::Error>, operation: &'static str) -> Self {
        Self::Store(err.into().context(operation))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::CooldownActive => "COOLDOWN_ACTIVE",
            Self::RequestLimitReached { .. } => "REQUEST_LIMIT_REACHED",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NoOtpFound => "NO_OTP_FOUND",
            Self::InvalidOtp => "INVALID_OTP",
            Self::Store(_) => "STORE_UNAVAILABLE",
            Self::Delivery(_) => "DELIVERY_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Whole minutes the caller should wait before retrying, when known.
    pub fn retry_after_minutes(&self) -> Option<i64> {
        match self {
            Self::RequestLimitReached { wait_minutes } => Some(*wait_minutes),
            _ => None,
        }
    }
}

impl IntoResponse for OtpServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::UserNotFound => StatusCode::NOT_FOUND,
            Self::CooldownActive | Self::RequestLimitReached { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NoOtpFound | Self::InvalidOtp => StatusCode::UNAUTHORIZED,
            Self::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Delivery(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // 4xx are expected client errors; TraceLayer already records them.
        match &self {
            Self::Store(e) | Self::Delivery(e) | Self::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), kind = self.kind(), "request failed");
            }
            _ => {}
        }
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Some(minutes) = self.retry_after_minutes() {
            body["retry_after_minutes"] = minutes.into();
        }
        (status, axum::Json(body)).into_response()
    }
}
