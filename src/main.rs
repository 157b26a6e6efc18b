use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use estatehub::{
    config::Config,
    db::DBClient,
    routes::create_router,
    service::listing_expiry::start_listing_expiry_job,
    AppState,
};

/// Upper bound on waiting for a pooled connection.
const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    let config = Config::init().context("invalid configuration")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(DB_ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .context("failed to connect to the database")?;

    tracing::info!("✅ Connection to the database is successful!");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    let db_client = match &config.redis_url {
        Some(redis_url) => DBClient::with_redis(pool, redis_url).await,
        None => {
            tracing::info!("REDIS_URL not set, running without cache");
            DBClient::new(pool)
        }
    };

    let allowed_origins = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let app_state = Arc::new(AppState::new(db_client, config.clone()));

    if !app_state.env.cloudinary.is_configured() {
        tracing::warn!("Media host credentials missing, upload signatures will be refused");
    }

    tokio::spawn(start_listing_expiry_job(app_state.clone()));

    let app = create_router(app_state).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;

    tracing::info!("🚀 Server is running on http://localhost:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
