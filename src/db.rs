use crate::{
    error::{is_unique_violation, LinkError},
    models::{AnalyticsSummary, ClickStat, Link, LinkChanges, LinkFilter, LinkWithStats, NewLink},
    settings::RedirectSettings,
    slug,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::SqlitePool;

/// `SELECT <link columns> FROM links <rest>`
macro_rules! select_links {
    ($rest:literal) => {
        concat!(
            "SELECT id, slug, target_url, title, description, mode, is_active, ",
            "created_at, updated_at, created_by FROM links ",
            $rest
        )
    };
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

// ── Links ──────────────────────────────────────────────────────────────────

/// Insert a new link and return the stored row.
///
/// An empty slug is replaced by a random one of `slug_length` characters; a
/// generated slug that hits the unique index is simply drawn again.
pub async fn create_link(
    pool: &SqlitePool,
    new: &NewLink,
    slug_length: usize,
) -> Result<Link, LinkError> {
    let target_url = slug::clean_target_url(&new.target_url)?;
    let requested = new.slug.trim();

    if requested.is_empty() {
        loop {
            let candidate = slug::random(slug_length);
            match insert_link(pool, &candidate, &target_url, new).await {
                Ok(link) => return Ok(link),
                Err(e) if is_unique_violation(&e) => {
                    tracing::debug!("Generated slug '{}' collided, drawing again", candidate);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    let slug = slug::clean(requested)?;
    if slug_taken(pool, &slug, None).await? {
        return Err(LinkError::SlugConflict(slug));
    }

    insert_link(pool, &slug, &target_url, new)
        .await
        .map_err(|e| conflict_or_store(e, &slug))
}

async fn insert_link(
    pool: &SqlitePool,
    slug: &str,
    target_url: &str,
    new: &NewLink,
) -> Result<Link, sqlx::Error> {
    let created_at = new.created_at.unwrap_or_else(now);
    let updated_at = new.updated_at.unwrap_or(created_at);

    let id = sqlx::query(
        "INSERT INTO links
             (slug, target_url, title, description, mode, is_active, created_at, updated_at, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )
    .bind(slug)
    .bind(target_url)
    .bind(new.title.as_deref().filter(|s| !s.is_empty()))
    .bind(new.description.as_deref().filter(|s| !s.is_empty()))
    .bind(new.mode)
    .bind(new.is_active)
    .bind(created_at)
    .bind(updated_at)
    .bind(new.created_by)
    .execute(pool)
    .await?
    .last_insert_rowid();

    let link: Link = sqlx::query_as(select_links!("WHERE id = ?1"))
        .bind(id)
        .fetch_one(pool)
        .await?;

    tracing::info!("Created link '{}' -> {}", link.slug, link.target_url);
    Ok(link)
}

/// Apply a partial update. The uniqueness check ignores the link itself.
pub async fn update_link(
    pool: &SqlitePool,
    id: i64,
    changes: &LinkChanges,
) -> Result<Link, LinkError> {
    let current = get_link_by_id(pool, id).await?.ok_or(LinkError::NotFound)?;

    let slug = match changes.slug.as_deref() {
        Some(input) => slug::clean(input.trim())?,
        None => current.slug.clone(),
    };
    let target_url = match changes.target_url.as_deref() {
        Some(input) => slug::clean_target_url(input)?,
        None => current.target_url.clone(),
    };

    if slug != current.slug && slug_taken(pool, &slug, Some(id)).await? {
        return Err(LinkError::SlugConflict(slug));
    }

    let title = match &changes.title {
        Some(value) => value.clone().filter(|s| !s.is_empty()),
        None => current.title.clone(),
    };
    let description = match &changes.description {
        Some(value) => value.clone().filter(|s| !s.is_empty()),
        None => current.description.clone(),
    };

    let affected = sqlx::query(
        "UPDATE links
         SET slug = ?1, target_url = ?2, title = ?3, description = ?4,
             mode = ?5, is_active = ?6, updated_at = ?7
         WHERE id = ?8",
    )
    .bind(&slug)
    .bind(&target_url)
    .bind(title)
    .bind(description)
    .bind(changes.mode.unwrap_or(current.mode))
    .bind(changes.is_active.unwrap_or(current.is_active))
    .bind(now())
    .bind(id)
    .execute(pool)
    .await
    .map_err(|e| conflict_or_store(e, &slug))?
    .rows_affected();

    if affected == 0 {
        return Err(LinkError::NotFound);
    }

    get_link_by_id(pool, id).await?.ok_or(LinkError::NotFound)
}

/// Delete a link together with its click stats.
pub async fn delete_link(pool: &SqlitePool, id: i64) -> Result<(), LinkError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM click_stats WHERE link_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let affected = sqlx::query("DELETE FROM links WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if affected == 0 {
        tx.rollback().await?;
        return Err(LinkError::NotFound);
    }

    tx.commit().await?;
    Ok(())
}

/// Enable or disable a link.
pub async fn set_active(pool: &SqlitePool, id: i64, active: bool) -> Result<(), LinkError> {
    let affected = sqlx::query("UPDATE links SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(active)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(LinkError::NotFound);
    }
    Ok(())
}

/// Flip the active flag and return the updated row.
pub async fn toggle_active(pool: &SqlitePool, id: i64) -> Result<Link, LinkError> {
    let link = get_link_by_id(pool, id).await?.ok_or(LinkError::NotFound)?;
    set_active(pool, id, !link.is_active).await?;
    get_link_by_id(pool, id).await?.ok_or(LinkError::NotFound)
}

/// Delete several links (and their stats) at once. Returns how many existed.
pub async fn bulk_delete(pool: &SqlitePool, ids: &[i64]) -> Result<u64, LinkError> {
    let mut tx = pool.begin().await?;
    let mut deleted = 0;

    for id in ids {
        sqlx::query("DELETE FROM click_stats WHERE link_id = ?1")
            .bind(*id)
            .execute(&mut *tx)
            .await?;
        deleted += sqlx::query("DELETE FROM links WHERE id = ?1")
            .bind(*id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }

    tx.commit().await?;
    Ok(deleted)
}

/// Enable or disable several links. Returns how many existed.
pub async fn bulk_set_active(pool: &SqlitePool, ids: &[i64], active: bool) -> Result<u64, LinkError> {
    let stamp = now();
    let mut tx = pool.begin().await?;
    let mut changed = 0;

    for id in ids {
        changed += sqlx::query("UPDATE links SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(active)
            .bind(stamp)
            .bind(*id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }

    tx.commit().await?;
    Ok(changed)
}

/// Exact, case-sensitive lookup by slug (any status).
pub async fn get_link_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Link>, sqlx::Error> {
    sqlx::query_as(select_links!("WHERE slug = ?1"))
        .bind(slug)
        .fetch_optional(pool)
        .await
}

/// Fetch a single link by its primary key (any status).
pub async fn get_link_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Link>, sqlx::Error> {
    sqlx::query_as(select_links!("WHERE id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// All links matching `filter`, newest first, with their click aggregates.
/// Links that were never clicked report zero clicks and no last click date.
pub async fn list_links(
    pool: &SqlitePool,
    filter: &LinkFilter,
) -> Result<Vec<LinkWithStats>, sqlx::Error> {
    let pattern = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    sqlx::query_as(
        "SELECT l.id AS id, l.slug AS slug, l.target_url AS target_url, l.title AS title,
                l.description AS description, l.mode AS mode, l.is_active AS is_active,
                l.created_at AS created_at, l.updated_at AS updated_at,
                l.created_by AS created_by,
                COALESCE(SUM(s.clicks), 0) AS total_clicks,
                MAX(s.stat_date)           AS last_click_date
         FROM links l
         LEFT JOIN click_stats s ON s.link_id = l.id
         WHERE (?1 IS NULL OR l.is_active = ?1)
           AND (?2 IS NULL OR l.slug LIKE ?2 OR l.target_url LIKE ?2 OR l.title LIKE ?2)
         GROUP BY l.id
         ORDER BY l.created_at DESC, l.id DESC",
    )
    .bind(filter.active)
    .bind(pattern)
    .fetch_all(pool)
    .await
}

/// Active links, newest first, for the link picker.
pub async fn active_links(pool: &SqlitePool, limit: i64) -> Result<Vec<Link>, sqlx::Error> {
    sqlx::query_as(select_links!(
        "WHERE is_active = 1 ORDER BY created_at DESC, id DESC LIMIT ?1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Every link, newest first (CSV export).
pub async fn all_links(pool: &SqlitePool) -> Result<Vec<Link>, sqlx::Error> {
    sqlx::query_as(select_links!("ORDER BY created_at DESC, id DESC"))
        .fetch_all(pool)
        .await
}

async fn slug_taken(pool: &SqlitePool, slug: &str, except_id: Option<i64>) -> Result<bool, sqlx::Error> {
    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM links WHERE slug = ?1 AND id != ?2 LIMIT 1")
            .bind(slug)
            .bind(except_id.unwrap_or(0))
            .fetch_optional(pool)
            .await?;
    Ok(existing.is_some())
}

fn conflict_or_store(err: sqlx::Error, slug: &str) -> LinkError {
    if is_unique_violation(&err) {
        LinkError::SlugConflict(slug.to_owned())
    } else {
        LinkError::Store(err)
    }
}

// ── Click stats ────────────────────────────────────────────────────────────

/// Count one click for `link_id` on `date`.
///
/// A single upsert statement, so concurrent increments on the same
/// (link, day) serialize on SQLite's write lock and none are lost.
pub async fn increment_clicks(
    pool: &SqlitePool,
    link_id: i64,
    date: NaiveDate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO click_stats (link_id, stat_date, clicks) VALUES (?1, ?2, 1)
         ON CONFLICT (link_id, stat_date) DO UPDATE SET clicks = clicks + 1",
    )
    .bind(link_id)
    .bind(date)
    .execute(pool)
    .await?;

    Ok(())
}

/// Per-day counters for one link, newest day first.
pub async fn daily_stats(pool: &SqlitePool, link_id: i64) -> Result<Vec<ClickStat>, sqlx::Error> {
    sqlx::query_as(
        "SELECT link_id, stat_date, clicks
         FROM click_stats
         WHERE link_id = ?1
         ORDER BY stat_date DESC",
    )
    .bind(link_id)
    .fetch_all(pool)
    .await
}

/// Link row plus its per-day history, or `None` for an unknown id.
pub async fn get_analytics(
    pool: &SqlitePool,
    link_id: i64,
) -> Result<Option<AnalyticsSummary>, sqlx::Error> {
    let link = match get_link_by_id(pool, link_id).await? {
        Some(l) => l,
        None => return Ok(None),
    };

    let days = daily_stats(pool, link_id).await?;
    let total_clicks = days.iter().map(|d| d.clicks).sum();

    Ok(Some(AnalyticsSummary {
        link,
        total_clicks,
        days,
    }))
}

// ── Settings ───────────────────────────────────────────────────────────────

const KEY_COUNTDOWN: &str = "countdown_seconds";
const KEY_UI_PAGE: &str = "ui_page_url";

/// Overlay persisted settings on top of `defaults`.
pub async fn load_settings(
    pool: &SqlitePool,
    defaults: RedirectSettings,
) -> Result<RedirectSettings, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT key, value FROM settings")
        .fetch_all(pool)
        .await?;

    let mut settings = defaults;
    for (key, value) in rows {
        match key.as_str() {
            KEY_COUNTDOWN => {
                settings.countdown_seconds =
                    crate::config::normalize_countdown(value.trim().parse().ok());
            }
            KEY_UI_PAGE => {
                settings.ui_page_url = Some(value).filter(|v| !v.trim().is_empty());
            }
            other => tracing::warn!("Ignoring unknown setting '{}'", other),
        }
    }

    Ok(settings)
}

/// Persist the redirect settings.
pub async fn save_settings(pool: &SqlitePool, settings: &RedirectSettings) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for (key, value) in [
        (KEY_COUNTDOWN, settings.countdown_seconds.to_string()),
        (KEY_UI_PAGE, settings.ui_page_url.clone().unwrap_or_default()),
    ] {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}
