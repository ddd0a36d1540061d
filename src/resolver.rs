//! Turns an inbound slug into what the visitor should get.
//!
//! Lookup → active check → click accounting → mode dispatch. The result is a
//! plain [`Resolution`] value; the HTTP layer decides how to render it.

use axum::http::StatusCode;
use chrono::{Local, NaiveDate};
use sqlx::SqlitePool;

use crate::{
    db,
    error::LinkError,
    models::{Link, LinkMode},
    settings::RedirectSettings,
};

/// Outcome of resolving a slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Unknown or disabled slug. Both look the same from outside.
    NotFound,
    Redirect { location: String, status: StatusCode },
    Interstitial(Interstitial),
}

/// Everything the countdown page needs. `countdown_seconds` is at least 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interstitial {
    pub title: Option<String>,
    pub description: Option<String>,
    pub target_url: String,
    pub countdown_seconds: u32,
}

pub struct Resolver<'a> {
    pool: &'a SqlitePool,
    settings: &'a RedirectSettings,
}

impl<'a> Resolver<'a> {
    pub fn new(pool: &'a SqlitePool, settings: &'a RedirectSettings) -> Self {
        Self { pool, settings }
    }

    /// Resolve `slug`, counting the click against the server's local date.
    pub async fn resolve(&self, slug: &str) -> Result<Resolution, LinkError> {
        self.resolve_on(slug, Local::now().date_naive()).await
    }

    /// Resolve `slug`, counting the click against `today`.
    ///
    /// Lookup failures propagate; click accounting failures are logged and
    /// never change the outcome.
    pub async fn resolve_on(&self, slug: &str, today: NaiveDate) -> Result<Resolution, LinkError> {
        let link = match db::get_link_by_slug(self.pool, slug).await? {
            Some(link) if link.is_active => link,
            Some(_) | None => return Ok(Resolution::NotFound),
        };

        if let Err(e) = db::increment_clicks(self.pool, link.id, today).await {
            tracing::warn!("Click accounting failed for '{}': {:?}", link.slug, e);
        }

        Ok(self.dispatch(link))
    }

    fn dispatch(&self, link: Link) -> Resolution {
        match link.mode {
            LinkMode::Backend => Resolution::Redirect {
                location: link.target_url,
                status: StatusCode::FOUND,
            },
            LinkMode::Ui => match self.settings.ui_page_url.as_deref() {
                Some(page) => Resolution::Redirect {
                    location: with_slug_param(page, &link.slug),
                    status: StatusCode::FOUND,
                },
                None => Resolution::Interstitial(self.interstitial(link)),
            },
        }
    }

    /// Countdown data for an active link, for embedding in the custom UI page.
    ///
    /// No click is recorded: the visitor already passed through
    /// [`Resolver::resolve`] on the way to that page.
    pub async fn countdown_for(&self, slug: &str) -> Result<Option<Interstitial>, LinkError> {
        Ok(db::get_link_by_slug(self.pool, slug)
            .await?
            .filter(|link| link.is_active)
            .map(|link| self.interstitial(link)))
    }

    fn interstitial(&self, link: Link) -> Interstitial {
        Interstitial {
            title: link.title,
            description: link.description,
            target_url: link.target_url,
            countdown_seconds: self.settings.countdown_seconds.max(1),
        }
    }
}

/// Append `slug=<slug>` to a page URL, keeping any existing query.
fn with_slug_param(page: &str, slug: &str) -> String {
    let (base, fragment) = match page.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (page, None),
    };
    let sep = if base.contains('?') { '&' } else { '?' };
    match fragment {
        Some(fragment) => format!("{base}{sep}slug={slug}#{fragment}"),
        None => format!("{base}{sep}slug={slug}"),
    }
}
