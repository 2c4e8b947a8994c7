use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use be_ledger_db::DatabaseManager;
use tower::ServiceBuilder;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::debug;

pub mod analytics;
pub mod auth;
pub mod card;
pub mod config;
pub mod error;
pub mod fees;
pub mod handlers;
pub mod ledger;
pub mod payment_methods;
pub mod plans;
pub mod redirect;
pub mod service;
pub mod types;

use service::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // WEBSITE_URL is validated during PaymentConfig::from_env(), so this
    // parse cannot fail at runtime.
    let origin = state
        .config
        .website_url
        .parse()
        .expect("WEBSITE_URL was validated during config loading");

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    let payment_governor = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("valid governor config");

    let jwt_config = state.jwt_config.clone();

    let payment_routes = Router::new()
        .route("/groups/{group_id}/payments", post(handlers::create_payment))
        .route(
            "/groups/{group_id}/payments/redirect",
            post(handlers::create_redirect_payment),
        )
        .layer(GovernorLayer::new(Arc::new(payment_governor)));

    // The payer returns here from the gateway's approval page; there is no
    // bearer or api_key on that redirect, and no rate limit either.
    let callback_route = Router::new().route(
        "/groups/{group_id}/transactions/{transaction_id}/callback",
        get(handlers::redirect_callback),
    );

    payment_routes
        .merge(callback_route)
        .layer(Extension(jwt_config))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

pub fn init_payment_service(db: Arc<DatabaseManager>) -> Result<Router> {
    debug!("Initializing payment service");

    let state = Arc::new(AppState::from_env(db).context("Failed to create payment service state")?);

    Ok(create_router(state))
}

pub use config::PaymentConfig;
pub use error::PaymentError;
pub use types::{
    CallbackQuery, DonationResponse, DonationSummary, LinksResponse, PaymentLink, PaymentRequest,
    TransactionSummary,
};
