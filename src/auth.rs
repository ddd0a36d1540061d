use crate::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::Redirect,
};
use axum_extra::extract::CookieJar;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Name of the cookie carrying the admin session token.
pub const SESSION_COOKIE: &str = "golinks_session";

// ── Session Store ──────────────────────────────────────────────────────────

/// In-memory admin sessions: token (UUID) → creation instant.
/// Tokens expire after `session_duration`; all sessions are lost on restart.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Instant>>,
    pub session_duration: Duration,
}

impl SessionStore {
    pub fn new(session_duration_hours: u64) -> Self {
        Self::with_duration(Duration::from_secs(session_duration_hours * 3600))
    }

    pub fn with_duration(session_duration: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            session_duration,
        }
    }

    /// Start a session and return its token. Expired sessions are pruned here.
    pub async fn create(&self) -> String {
        let token = Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, created_at| created_at.elapsed() < self.session_duration);
        sessions.insert(token.clone(), Instant::now());
        token
    }

    /// `true` if the token exists and has not expired.
    pub async fn is_valid(&self, token: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions
            .get(token)
            .is_some_and(|created_at| created_at.elapsed() < self.session_duration)
    }

    /// Logout.
    pub async fn remove(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    pub async fn is_authenticated(&self, jar: &CookieJar) -> bool {
        match jar.get(SESSION_COOKIE) {
            Some(cookie) => self.is_valid(cookie.value()).await,
            None => false,
        }
    }
}

// ── AuthUser extractor ─────────────────────────────────────────────────────

/// Guard for admin handlers. Without a valid session cookie the request is
/// redirected to the login page and the handler never runs.
pub struct AuthUser;

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AppState>: FromRef<S>,
{
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = Arc::<AppState>::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        if state.sessions.is_authenticated(&jar).await {
            Ok(AuthUser)
        } else {
            Err(Redirect::to("/admin/login"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_validate_until_removed() {
        let store = SessionStore::new(1);
        let token = store.create().await;

        assert!(store.is_valid(&token).await);
        assert!(!store.is_valid("forged").await);

        store.remove(&token).await;
        assert!(!store.is_valid(&token).await);
    }

    #[tokio::test]
    async fn sessions_expire() {
        let store = SessionStore::with_duration(Duration::from_millis(20));
        let token = store.create().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.is_valid(&token).await);
    }
}
