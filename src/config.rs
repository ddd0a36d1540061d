use anyhow::{Context, Result};

/// Countdown used when nothing (or something non-positive) is configured.
pub const DEFAULT_COUNTDOWN_SECONDS: u32 = 10;

/// Length of auto-generated slugs.
pub const DEFAULT_SLUG_LENGTH: usize = 6;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./golinks.db"
    pub database_url: String,

    /// Plain-text admin password loaded from the environment at startup
    pub admin_password: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when building short links, e.g. "https://example.com".
    /// Must NOT have a trailing slash.
    pub base_url: String,

    /// How many hours an admin session token remains valid
    pub session_duration_hours: u64,

    /// Where visitors hitting "/" are sent.
    pub root_redirect_url: String,

    /// Default countdown for UI-mode links. Overridable from the settings page.
    pub countdown_seconds: u32,

    /// Optional page that replaces the built-in countdown for UI-mode links.
    /// The slug is appended as a `slug` query parameter.
    pub ui_page_url: Option<String>,

    /// Length of generated slugs (1–50).
    pub slug_length: usize,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_source(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let admin_password = var("ADMIN_PASSWORD")
            .context("ADMIN_PASSWORD must be set in the environment or .env file")?;

        if admin_password.trim().is_empty() {
            anyhow::bail!("ADMIN_PASSWORD must not be empty");
        }

        let port = var("PORT")
            .unwrap_or_else(|| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let session_duration_hours = var("SESSION_DURATION_HOURS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(24);

        let base_url = var("BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let root_redirect_url = var("ROOT_REDIRECT_URL")
            .unwrap_or_else(|| format!("{base_url}/admin"))
            .trim_end_matches('/')
            .to_owned();

        let countdown_seconds =
            normalize_countdown(var("COUNTDOWN_SECONDS").and_then(|v| v.trim().parse().ok()));

        let ui_page_url = var("UI_PAGE_URL")
            .filter(|v| !v.trim().is_empty())
            .map(|v| crate::slug::clean_target_url(&v))
            .transpose()
            .context("UI_PAGE_URL must be an absolute http(s) URL")?;

        let slug_length = var("SLUG_LENGTH")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_SLUG_LENGTH)
            .clamp(1, crate::slug::MAX_SLUG_LEN);

        Ok(Self {
            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite:./golinks.db".into()),
            admin_password,
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            base_url,
            session_duration_hours,
            root_redirect_url,
            countdown_seconds,
            ui_page_url,
            slug_length,
        })
    }

    /// Public short URL for a slug.
    pub fn short_url(&self, slug: &str) -> String {
        format!("{}/go/{}", self.base_url, slug)
    }
}

/// Non-positive or missing countdowns fall back to the default.
pub fn normalize_countdown(seconds: Option<i64>) -> u32 {
    match seconds {
        Some(s) if s > 0 => u32::try_from(s).unwrap_or(u32::MAX),
        _ => DEFAULT_COUNTDOWN_SECONDS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn requires_admin_password() {
        assert!(load(&[]).is_err());
        assert!(load(&[("ADMIN_PASSWORD", "   ")]).is_err());
    }

    #[test]
    fn applies_defaults() {
        let config = load(&[("ADMIN_PASSWORD", "secret")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.countdown_seconds, 10);
        assert_eq!(config.slug_length, 6);
        assert_eq!(config.session_duration_hours, 24);
        assert!(config.ui_page_url.is_none());
        assert_eq!(config.short_url("promo"), "http://localhost:3000/go/promo");
    }

    #[test]
    fn trims_base_url_and_reads_overrides() {
        let config = load(&[
            ("ADMIN_PASSWORD", "secret"),
            ("BASE_URL", "https://sho.rt/"),
            ("COUNTDOWN_SECONDS", "3"),
            ("UI_PAGE_URL", "https://sho.rt/wait"),
            ("SLUG_LENGTH", "500"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "https://sho.rt");
        assert_eq!(config.countdown_seconds, 3);
        assert_eq!(config.ui_page_url.as_deref(), Some("https://sho.rt/wait"));
        assert_eq!(config.slug_length, 50);
    }

    #[test]
    fn validates_ui_page_url() {
        assert!(load(&[("ADMIN_PASSWORD", "secret"), ("UI_PAGE_URL", "sho.rt/wait")]).is_err());
        assert!(load(&[("ADMIN_PASSWORD", "secret"), ("UI_PAGE_URL", "https://sho.rt/a b")]).is_err());

        let blank = load(&[("ADMIN_PASSWORD", "secret"), ("UI_PAGE_URL", "  ")]).unwrap();
        assert!(blank.ui_page_url.is_none());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(load(&[("ADMIN_PASSWORD", "secret"), ("PORT", "http")]).is_err());
    }

    #[test]
    fn countdown_falls_back_for_non_positive_values() {
        assert_eq!(normalize_countdown(None), 10);
        assert_eq!(normalize_countdown(Some(0)), 10);
        assert_eq!(normalize_countdown(Some(-4)), 10);
        assert_eq!(normalize_countdown(Some(1)), 1);
    }
}
