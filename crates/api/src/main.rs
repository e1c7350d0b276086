use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skinscan_api::config::{LogFormat, ServerConfig};
use skinscan_api::router::build_app_router;
use skinscan_api::state::AppState;
use skinscan_db::repositories::{PgAchievementRepo, PgEntitlementRepo};
use skinscan_oracle::OracleClient;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let json_logs = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skinscan_api=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    if config.billing.webhook_secret.is_none() {
        if config.billing.allow_unsigned {
            tracing::warn!("BILLING_WEBHOOK_SECRET unset; unsigned billing webhooks are accepted");
        } else {
            tracing::warn!("BILLING_WEBHOOK_SECRET unset; billing webhooks will be rejected");
        }
    }

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = skinscan_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    skinscan_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    skinscan_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Scoring oracle ---
    let oracle = OracleClient::new(
        config.oracle.url.clone(),
        Duration::from_secs(config.oracle.timeout_secs),
    )
    .expect("Failed to build scoring oracle client");
    tracing::info!(timeout_secs = config.oracle.timeout_secs, "Scoring oracle client ready");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        entitlements: Arc::new(PgEntitlementRepo::new(pool.clone())),
        achievements: Arc::new(PgAchievementRepo::new(pool)),
        oracle: Arc::new(oracle),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
