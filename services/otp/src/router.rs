use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use otpguard_core::health::{healthz, readyz};
use otpguard_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::otp::{invalidate_otp, issue_otp, verify_otp};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // OTP
        .route("/otp", post(issue_otp))
        .route("/otp/verify", post(verify_otp))
        .route("/otp/{user_id}/{purpose}", delete(invalidate_otp))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
