use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use payrail::{
    auth::{GoogleVerifier, SessionKeys},
    config::Config,
    db::{create_pool, MemoryStore, PgStore, Store},
    middleware::{cors_layer, PaymentRateLimiter},
    routes::create_router,
    utils::init_logger,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);
    info!("Configuration loaded: {:?}", config.server);

    // Pick the store
    let store: Arc<dyn Store> = match &config.database.url {
        Some(url) => {
            let pool = create_pool(&config.database, url).await?;

            info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
            info!("Database migrations completed");

            Arc::new(PgStore::new(pool, config.payments.max_retries))
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Create shared state
    let state = AppState {
        store,
        identity: Arc::new(GoogleVerifier::new(&config.auth)?),
        sessions: SessionKeys::new(&config.auth.session_secret, config.auth.max_jwt_expiration),
        payment_limiter: PaymentRateLimiter::per_minute(config.payments.rate_per_minute),
        config: config.clone(),
    };

    // Create router
    let app = create_router(state)
        .layer(cors_layer(&config.server.cors_allowed_origins))
        .layer(TraceLayer::new_for_http());

    // Start server
    let ip = config
        .server
        .host
        .parse::<std::net::IpAddr>()
        .map_err(|e| anyhow::anyhow!("Invalid HOST '{}': {}", config.server.host, e))?;
    let addr = SocketAddr::new(ip, config.server.port);
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}
