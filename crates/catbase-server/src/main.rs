mod config;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use catbase_api::AppStateInner;
use catbase_core::accounts::{Accounts, NewAccount};
use catbase_core::tokens::TokenIssuer;
use catbase_db::Database;
use catbase_types::models::{ROLE_ADMIN, ROLE_USER};

use crate::config::Config;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SEED_ADMIN_USERNAME: &str = "admin";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catbase=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);
    seed_admin(&db, &config)?;

    let mut issuer = TokenIssuer::new(config.jwt_secret.as_bytes());
    if let Some(previous) = &config.jwt_previous_secret {
        info!("Accepting tokens signed with the previous JWT secret");
        issuer = issuer.with_previous_secret(previous.as_bytes());
    }

    let state = AppStateInner::new(db, issuer);
    match state.sessions.refresh_tokens().purge_stale(Utc::now()) {
        Ok(0) => {}
        Ok(n) => info!("Purged {} stale refresh tokens", n),
        Err(e) => warn!("Refresh token purge failed: {:#}", e),
    }

    let app = catbase_api::router(state)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Catbase server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

/// Creates the bootstrap admin account on first start.
fn seed_admin(db: &Arc<Database>, config: &Config) -> anyhow::Result<()> {
    let Some(password) = &config.seed_admin_password else {
        return Ok(());
    };

    let accounts = Accounts::new(db.clone());
    if accounts.exists(SEED_ADMIN_USERNAME)? {
        return Ok(());
    }

    accounts.create(&NewAccount {
        username: SEED_ADMIN_USERNAME,
        email: "admin@localhost",
        password,
        roles: &[ROLE_ADMIN, ROLE_USER],
    })?;
    info!("Seeded '{}' account", SEED_ADMIN_USERNAME);
    Ok(())
}
