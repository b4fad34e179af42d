use std::sync::Arc;

use sea_orm::Database;
use tracing::info;

use otpguard_core::config::Config;
use otpguard_core::tracing::init_tracing;
use otpguard_otp::config::OtpConfig;
use otpguard_otp::infra::notifier::MailNotifier;
use otpguard_otp::router::build_router;
use otpguard_otp::state::AppState;
use otpguard_otp::usecase::code::{CodeGenerator, CodeHasher};
use otpguard_otp::usecase::lock::IssueLocks;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = OtpConfig::from_env().expect("failed to load config from environment");

    let policy = config.policy().expect("invalid OTP policy configuration");

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    let hasher = CodeHasher::new(
        config.hash_cost(),
        config.otp_hash_pepper.as_deref().map(str::as_bytes),
    )
    .expect("invalid OTP hash configuration");

    let notifier =
        MailNotifier::from_relay_url(config.mail_relay_url.clone(), config.mail_from.clone())
            .expect("invalid mail relay configuration");
    if matches!(notifier, MailNotifier::Disabled) {
        tracing::warn!("MAIL_RELAY_URL not set, OTP codes will not be delivered");
    }

    let state = AppState {
        db,
        generator: Arc::new(CodeGenerator::new()),
        hasher,
        locks: IssueLocks::new(),
        notifier,
        policy,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.otp_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("otp service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
