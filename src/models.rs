use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// How a link is served to visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum LinkMode {
    /// Immediate HTTP redirect.
    #[default]
    Backend,
    /// Countdown page, then client-side redirect.
    Ui,
}

impl LinkMode {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkMode::Backend => "backend",
            LinkMode::Ui => "ui",
        }
    }

    /// Anything other than "ui" is treated as backend.
    pub fn from_input(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("ui") => LinkMode::Ui,
            _ => LinkMode::Backend,
        }
    }
}

/// A short link record from the `links` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Link {
    pub id: i64,
    pub slug: String,
    pub target_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub mode: LinkMode,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub created_by: Option<i64>,
}

impl Link {
    pub fn is_ui(&self) -> bool {
        self.mode == LinkMode::Ui
    }
}

/// One per-day counter from the `click_stats` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClickStat {
    pub link_id: i64,
    pub stat_date: NaiveDate,
    pub clicks: i64,
}

/// A link joined with its aggregated click stats, used on the dashboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LinkWithStats {
    #[sqlx(flatten)]
    pub link: Link,
    pub total_clicks: i64,
    pub last_click_date: Option<NaiveDate>,
}

/// Input for a new link. An empty `slug` asks the store to generate one.
#[derive(Debug, Clone, Default)]
pub struct NewLink {
    pub slug: String,
    pub target_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub mode: LinkMode,
    pub is_active: bool,
    pub created_by: Option<i64>,
    /// Preserved timestamps (CSV import); `None` means now.
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Partial update; `None` leaves the column alone.
///
/// `title` and `description` use `Some(None)` to clear the value.
#[derive(Debug, Clone, Default)]
pub struct LinkChanges {
    pub slug: Option<String>,
    pub target_url: Option<String>,
    pub title: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub mode: Option<LinkMode>,
    pub is_active: Option<bool>,
}

/// Dashboard filter.
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    /// Substring matched against slug, target URL and title.
    pub search: Option<String>,
    pub active: Option<bool>,
}

/// Per-link analytics page data.
#[derive(Debug, Clone)]
pub struct AnalyticsSummary {
    pub link: Link,
    pub total_clicks: i64,
    pub days: Vec<ClickStat>,
}

/// Entry of the active-link snapshot served to the embeddable link picker.
#[derive(Debug, Clone, Serialize)]
pub struct PickerLink {
    pub id: i64,
    pub slug: String,
    pub title: Option<String>,
    pub target_url: String,
    pub short_url: String,
}

/// Normalise optional text input: trimmed, empty becomes `None`.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}
