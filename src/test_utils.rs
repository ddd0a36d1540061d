//! Shared fixtures for the unit tests.

#![cfg(test)]

use std::{str::FromStr, sync::Arc};

use chrono::NaiveDate;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};
use tempfile::TempDir;
use tokio::sync::RwLock;

use crate::{
    auth::SessionStore, config::AppConfig, models::NewLink, settings::RedirectSettings, AppState,
};

/// Fresh in-memory database with all migrations applied.
///
/// A single connection keeps the in-memory database alive for the pool's lifetime.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid in-memory url")
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// File-backed database with several connections, for concurrency tests.
/// Keep the returned directory alive for as long as the pool is used.
pub async fn file_pool() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .expect("Failed to open file database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    (pool, dir)
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        admin_password: "hunter2".into(),
        host: "127.0.0.1".into(),
        port: 3000,
        base_url: "https://sho.rt".into(),
        session_duration_hours: 1,
        root_redirect_url: "https://example.org".into(),
        countdown_seconds: 10,
        ui_page_url: None,
        slug_length: 6,
    }
}

/// Application state over a fresh in-memory database.
pub async fn test_state() -> Arc<AppState> {
    let config = test_config();
    Arc::new(AppState {
        db: test_pool().await,
        sessions: SessionStore::new(config.session_duration_hours),
        settings: RwLock::new(RedirectSettings::from_config(&config)),
        config,
    })
}

/// Active backend-mode link input.
pub fn new_link(slug: &str, target_url: &str) -> NewLink {
    NewLink {
        slug: slug.to_owned(),
        target_url: target_url.to_owned(),
        is_active: true,
        ..Default::default()
    }
}

/// Clicks recorded for one link on one day (0 if none).
pub async fn clicks_on(pool: &SqlitePool, link_id: i64, date: NaiveDate) -> i64 {
    let clicks: Option<i64> =
        sqlx::query_scalar("SELECT clicks FROM click_stats WHERE link_id = ?1 AND stat_date = ?2")
            .bind(link_id)
            .bind(date)
            .fetch_optional(pool)
            .await
            .expect("Failed to read click_stats");
    clicks.unwrap_or(0)
}
