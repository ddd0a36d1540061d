use crate::{
    resolver::{Interstitial, Resolution, Resolver},
    slug, AppState,
};
use askama::Template;
use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// What the countdown markup shows.
struct CountdownView {
    title: String,
    paragraphs: Vec<String>,
    target_url: String,
    seconds: u32,
}

impl From<Interstitial> for CountdownView {
    fn from(page: Interstitial) -> Self {
        let paragraphs = page
            .description
            .as_deref()
            .map(split_paragraphs)
            .unwrap_or_default();

        Self {
            title: page.title.unwrap_or_else(|| "Redirecting…".to_owned()),
            paragraphs,
            target_url: page.target_url,
            seconds: page.countdown_seconds,
        }
    }
}

/// Full countdown page served for UI-mode links.
#[derive(Template)]
#[template(path = "interstitial.html")]
struct InterstitialTemplate {
    view: CountdownView,
}

/// Bare countdown block for a custom UI page to embed.
#[derive(Template)]
#[template(path = "countdown.html")]
struct CountdownTemplate {
    view: CountdownView,
}

/// Shared by unknown and disabled links so the two can't be told apart.
#[derive(Template)]
#[template(path = "not_found.html")]
struct NotFoundTemplate {}

/// GET /go/:slug
///
/// Paths outside the slug alphabet never reach the store. Lookup errors
/// become a generic 500; everything else is whatever the resolver decided.
pub async fn go(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Response {
    if !slug::is_valid(&slug) {
        return not_found();
    }

    let settings = state.settings.read().await.clone();
    match Resolver::new(&state.db, &settings).resolve(&slug).await {
        Ok(resolution) => render(resolution),
        Err(e) => {
            tracing::error!("DB error resolving slug '{}': {:?}", slug, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// GET /go/:slug/embed
///
/// Countdown block for the custom UI page, which receives the slug in its
/// `slug` query parameter. Counts nothing; unknown and disabled slugs get the
/// usual 404.
pub async fn embed(State(state): State<Arc<AppState>>, Path(slug): Path<String>) -> Response {
    if !slug::is_valid(&slug) {
        return not_found();
    }

    let settings = state.settings.read().await.clone();
    match Resolver::new(&state.db, &settings).countdown_for(&slug).await {
        Ok(Some(page)) => (
            [(header::CACHE_CONTROL, "no-store")],
            CountdownTemplate {
                view: page.into(),
            },
        )
            .into_response(),
        Ok(None) => not_found(),
        Err(e) => {
            tracing::error!("DB error loading countdown for '{}': {:?}", slug, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

fn render(resolution: Resolution) -> Response {
    match resolution {
        Resolution::NotFound => not_found(),
        Resolution::Redirect { location, status } => match HeaderValue::try_from(location.as_str()) {
            Ok(location) => (
                status,
                [
                    (header::LOCATION, location),
                    (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
                ],
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Stored target {:?} is not a valid Location header: {:?}", location, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        },
        Resolution::Interstitial(page) => (
            [(header::CACHE_CONTROL, "no-store")],
            InterstitialTemplate { view: page.into() },
        )
            .into_response(),
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CACHE_CONTROL, "no-store")],
        NotFoundTemplate {},
    )
        .into_response()
}

/// Blank-line separated paragraphs, trimmed, empties dropped.
fn split_paragraphs(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
        .collect()
}
