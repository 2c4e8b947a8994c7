use axum::http::HeaderValue;
use be_ledger_db::DatabaseManager;
use be_payment_service::init_payment_service;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Configuration for running the monolith server.
pub struct ServerConfig {
    pub database_url: String,
    pub http_addr: SocketAddr,
    /// When this receiver gets a value, the server shuts down gracefully.
    pub shutdown: tokio::sync::watch::Receiver<()>,
}

fn build_cors() -> CorsLayer {
    let allowed: Vec<HeaderValue> = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "https://www.givehub.dev,https://api.givehub.dev".into())
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<HeaderValue>().ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(posthog_key) = std::env::var("POSTHOG_API_KEY")
        .ok()
        .filter(|s| !s.is_empty())
    {
        match posthog_rs::init_global(posthog_key.as_str()).await {
            Ok(()) => tracing::info!("PostHog analytics initialized"),
            Err(e) => tracing::warn!("Failed to initialize PostHog: {}", e),
        }
    } else {
        tracing::info!("POSTHOG_API_KEY not set, analytics disabled");
    }

    let db_manager = Arc::new(DatabaseManager::new(&config.database_url).await?);

    let payment_router = match init_payment_service(db_manager.clone()) {
        Ok(router) => router,
        Err(e) => {
            tracing::error!("Failed to initialize payment service: {}", e);
            return Err(e.into());
        }
    };

    let health_route = axum::Router::new().route(
        "/health",
        axum::routing::get(|| async { axum::http::StatusCode::OK }),
    );

    let http_router = payment_router.merge(health_route).layer(build_cors());

    tracing::info!("Starting HTTP server at {}", config.http_addr);

    let mut http_shutdown = config.shutdown.clone();
    let http_listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(
        http_listener,
        http_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
        tracing::info!("Shutting down HTTP server...");
    })
    .await?;

    Ok(())
}
