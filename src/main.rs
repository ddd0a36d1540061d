use std::{net::SocketAddr, sync::Arc};

use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod csv_transfer;
mod db;
mod error;
mod handlers;
mod models;
mod resolver;
mod routes;
mod settings;
mod slug;
#[cfg(test)]
mod test_utils;

use auth::SessionStore;
use settings::RedirectSettings;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: config::AppConfig,
    pub sessions: SessionStore,
    /// Live redirect settings; the settings page swaps them in place.
    pub settings: RwLock<RedirectSettings>,
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent; env vars may already be set)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "golinks=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting golinks on {}:{}", config.host, config.port);
    tracing::info!("Base URL: {}", config.base_url);

    // CREATE the database file if it doesn't exist yet
    let db = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(
            config
                .database_url
                .parse::<sqlx::sqlite::SqliteConnectOptions>()?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .foreign_keys(true),
        )
        .await?;

    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations applied");

    let settings = db::load_settings(&db, RedirectSettings::from_config(&config)).await?;
    tracing::info!(
        "UI countdown {}s, custom page: {}",
        settings.countdown_seconds,
        settings.ui_page_url.as_deref().unwrap_or("none")
    );

    let bind_addr = format!("{}:{}", config.host, config.port);

    let state = Arc::new(AppState {
        db,
        sessions: SessionStore::new(config.session_duration_hours),
        settings: RwLock::new(settings),
        config,
    });

    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
