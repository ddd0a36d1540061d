use crate::{
    auth::{AuthUser, SESSION_COOKIE},
    csv_transfer::{self, ConflictPolicy},
    db,
    models::{non_empty, AnalyticsSummary, LinkChanges, LinkFilter, LinkMode, LinkWithStats, NewLink, PickerLink},
    settings::RedirectSettings,
    AppState,
};
use askama::Template;
use axum::{
    extract::{Form, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use serde::Deserialize;
use std::sync::Arc;

/// How many active links the link picker receives.
const PICKER_LIMIT: i64 = 200;

// ── Template structs ───────────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: Option<String>,
}

/// One dashboard table row, pre-formatted for display.
struct DashboardRow {
    id: i64,
    slug: String,
    short_url: String,
    target_url: String,
    title: String,
    mode: &'static str,
    is_active: bool,
    total_clicks: i64,
    last_click: String,
    created: String,
}

impl DashboardRow {
    fn new(row: LinkWithStats, short_url: String) -> Self {
        let link = row.link;
        Self {
            id: link.id,
            short_url,
            target_url: link.target_url,
            title: link.title.unwrap_or_default(),
            mode: link.mode.as_str(),
            is_active: link.is_active,
            total_clicks: row.total_clicks,
            last_click: row
                .last_click_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "—".to_owned()),
            created: link.created_at.format("%Y-%m-%d %H:%M").to_string(),
            slug: link.slug,
        }
    }
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    links: Vec<DashboardRow>,
    base_url: String,
    search: String,
    status: String,
    flash_success: Option<String>,
    flash_error: Option<String>,
}

#[derive(Template)]
#[template(path = "edit.html")]
struct EditTemplate {
    id: i64,
    slug: String,
    target_url: String,
    title: String,
    description: String,
    is_ui: bool,
    is_active: bool,
    short_url: String,
}

#[derive(Template)]
#[template(path = "analytics.html")]
struct AnalyticsTemplate {
    summary: AnalyticsSummary,
    short_url: String,
    /// (date, clicks, pct_of_busiest_day)
    days: Vec<(String, i64, i64)>,
}

#[derive(Template)]
#[template(path = "settings.html")]
struct SettingsTemplate {
    countdown_seconds: u32,
    ui_page_url: String,
    flash_success: Option<String>,
    flash_error: Option<String>,
}

// ── Form types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginForm {
    password: String,
}

/// Shared by the create and edit forms. `is_active` is a checkbox: present means on.
#[derive(Deserialize)]
pub struct LinkForm {
    target_url: String,
    slug: Option<String>,
    title: Option<String>,
    description: Option<String>,
    mode: Option<String>,
    is_active: Option<String>,
}

#[derive(Deserialize)]
pub struct BulkForm {
    action: String,
    link_ids: String,
}

#[derive(Deserialize)]
pub struct SettingsForm {
    countdown: String,
    ui_page_url: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct DashboardQuery {
    q: Option<String>,
    status: Option<String>,
}

// ── Handlers ───────────────────────────────────────────────────────────────

/// GET /
/// Visitors at the root go to ROOT_REDIRECT_URL; admins use /admin.
pub async fn index(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::to(&state.config.root_redirect_url)
}

// ── Login / Logout ─────────────────────────────────────────────────────────

/// GET /admin/login
pub async fn login_page(jar: CookieJar, State(state): State<Arc<AppState>>) -> Response {
    if state.sessions.is_authenticated(&jar).await {
        return Redirect::to("/admin/dashboard").into_response();
    }
    LoginTemplate { error: None }.into_response()
}

/// POST /admin/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    if form.password != state.config.admin_password {
        // Slow down guessing.
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        tracing::warn!("Failed admin login attempt");
        return LoginTemplate {
            error: Some("Incorrect password.".into()),
        }
        .into_response();
    }

    let token = state.sessions.create().await;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(
            state.config.session_duration_hours as i64 * 3600,
        ))
        .build();

    (jar.add(cookie), Redirect::to("/admin/dashboard")).into_response()
}

/// GET /admin/logout
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value()).await;
    }

    let removal = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();

    (jar.add(removal), Redirect::to("/admin/login")).into_response()
}

// ── Dashboard ──────────────────────────────────────────────────────────────

/// GET /admin/dashboard?q=&status=active|inactive
pub async fn dashboard(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(query): Query<DashboardQuery>,
) -> Response {
    let (jar, flash_success, flash_error) = take_flash(jar);

    let status = query.status.unwrap_or_default();
    let filter = LinkFilter {
        search: non_empty(query.q.as_deref()),
        active: match status.as_str() {
            "active" => Some(true),
            "inactive" => Some(false),
            _ => None,
        },
    };

    let links = match db::list_links(&state.db, &filter).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to load links: {:?}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load links").into_response();
        }
    };

    let tmpl = DashboardTemplate {
        links: links
            .into_iter()
            .map(|row| {
                let short_url = state.config.short_url(&row.link.slug);
                DashboardRow::new(row, short_url)
            })
            .collect(),
        base_url: state.config.base_url.clone(),
        search: filter.search.unwrap_or_default(),
        status,
        flash_success,
        flash_error,
    };

    (jar, tmpl).into_response()
}

// ── Create / edit ──────────────────────────────────────────────────────────

/// POST /admin/links
pub async fn create_link(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LinkForm>,
) -> Response {
    let new = NewLink {
        slug: form.slug.unwrap_or_default(),
        target_url: form.target_url,
        title: non_empty(form.title.as_deref()),
        description: non_empty(form.description.as_deref()),
        mode: LinkMode::from_input(form.mode.as_deref()),
        is_active: form.is_active.is_some(),
        ..Default::default()
    };

    match db::create_link(&state.db, &new, state.config.slug_length).await {
        Ok(link) => set_flash_and_redirect(
            jar,
            Some(&format!("Link created: {}", state.config.short_url(&link.slug))),
            None,
            "/admin/dashboard",
        ),
        Err(e) => {
            if !e.is_validation() {
                tracing::error!("Failed to create link: {:?}", e);
            }
            set_flash_and_redirect(jar, None, Some(&e.user_message()), "/admin/dashboard")
        }
    }
}

/// GET /admin/links/:id/edit
pub async fn edit_page(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Response {
    match db::get_link_by_id(&state.db, id).await {
        Ok(Some(link)) => EditTemplate {
            id: link.id,
            short_url: state.config.short_url(&link.slug),
            is_ui: link.is_ui(),
            is_active: link.is_active,
            slug: link.slug,
            target_url: link.target_url,
            title: link.title.unwrap_or_default(),
            description: link.description.unwrap_or_default(),
        }
        .into_response(),
        Ok(None) => set_flash_and_redirect(jar, None, Some("Link not found."), "/admin/dashboard"),
        Err(e) => {
            tracing::error!("Failed to fetch link {}: {:?}", id, e);
            set_flash_and_redirect(
                jar,
                None,
                Some("Database error while looking up link."),
                "/admin/dashboard",
            )
        }
    }
}

/// POST /admin/links/:id
/// An empty slug keeps the current one.
pub async fn update_link(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<i64>,
    Form(form): Form<LinkForm>,
) -> Response {
    let changes = LinkChanges {
        slug: non_empty(form.slug.as_deref()),
        target_url: Some(form.target_url),
        title: Some(non_empty(form.title.as_deref())),
        description: Some(non_empty(form.description.as_deref())),
        mode: Some(LinkMode::from_input(form.mode.as_deref())),
        is_active: Some(form.is_active.is_some()),
    };

    match db::update_link(&state.db, id, &changes).await {
        Ok(link) => set_flash_and_redirect(
            jar,
            Some(&format!("Link '{}' updated.", link.slug)),
            None,
            "/admin/dashboard",
        ),
        Err(e) => {
            if !e.is_validation() {
                tracing::error!("Failed to update link {}: {:?}", id, e);
            }
            set_flash_and_redirect(jar, None, Some(&e.user_message()), "/admin/dashboard")
        }
    }
}

// ── Delete / toggle / bulk ─────────────────────────────────────────────────

/// POST /admin/links/:id/delete
pub async fn delete_link(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Response {
    match db::delete_link(&state.db, id).await {
        Ok(()) => set_flash_and_redirect(jar, Some("Link deleted."), None, "/admin/dashboard"),
        Err(e) => {
            tracing::error!("Failed to delete link {}: {:?}", id, e);
            set_flash_and_redirect(jar, None, Some(&e.user_message()), "/admin/dashboard")
        }
    }
}

/// POST /admin/links/:id/toggle
pub async fn toggle_link(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<i64>,
) -> Response {
    match db::toggle_active(&state.db, id).await {
        Ok(link) => {
            let verb = if link.is_active { "enabled" } else { "disabled" };
            set_flash_and_redirect(
                jar,
                Some(&format!("Link '{}' {verb}.", link.slug)),
                None,
                "/admin/dashboard",
            )
        }
        Err(e) => {
            tracing::error!("Failed to toggle link {}: {:?}", id, e);
            set_flash_and_redirect(jar, None, Some(&e.user_message()), "/admin/dashboard")
        }
    }
}

/// POST /admin/links/bulk  (action = delete | enable | disable, link_ids = "1,2,3")
pub async fn bulk_action(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<BulkForm>,
) -> Response {
    let ids = parse_ids(&form.link_ids);
    if ids.is_empty() {
        return set_flash_and_redirect(jar, None, Some("No links selected."), "/admin/dashboard");
    }

    let result = match form.action.as_str() {
        "delete" => db::bulk_delete(&state.db, &ids).await.map(|n| format!("{n} link(s) deleted.")),
        "enable" => db::bulk_set_active(&state.db, &ids, true)
            .await
            .map(|n| format!("{n} link(s) enabled.")),
        "disable" => db::bulk_set_active(&state.db, &ids, false)
            .await
            .map(|n| format!("{n} link(s) disabled.")),
        _ => {
            return set_flash_and_redirect(jar, None, Some("Unknown bulk action."), "/admin/dashboard");
        }
    };

    match result {
        Ok(msg) => set_flash_and_redirect(jar, Some(&msg), None, "/admin/dashboard"),
        Err(e) => {
            tracing::error!("Bulk '{}' failed: {:?}", form.action, e);
            set_flash_and_redirect(jar, None, Some(&e.user_message()), "/admin/dashboard")
        }
    }
}

// ── Analytics ──────────────────────────────────────────────────────────────

/// GET /admin/links/:id/analytics
pub async fn analytics(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Response {
    let summary = match db::get_analytics(&state.db, id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Link not found.").into_response();
        }
        Err(e) => {
            tracing::error!("Failed to load analytics for link {}: {:?}", id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load analytics.").into_response();
        }
    };

    let busiest = summary.days.iter().map(|d| d.clicks).max().unwrap_or(0);
    let days = summary
        .days
        .iter()
        .map(|d| {
            let pct = if busiest > 0 { d.clicks * 100 / busiest } else { 0 };
            (d.stat_date.format("%Y-%m-%d").to_string(), d.clicks, pct)
        })
        .collect();

    AnalyticsTemplate {
        short_url: state.config.short_url(&summary.link.slug),
        summary,
        days,
    }
    .into_response()
}

// ── Settings ───────────────────────────────────────────────────────────────

/// GET /admin/settings
pub async fn settings_page(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Response {
    let (jar, flash_success, flash_error) = take_flash(jar);
    let settings = state.settings.read().await.clone();

    let tmpl = SettingsTemplate {
        countdown_seconds: settings.countdown_seconds,
        ui_page_url: settings.ui_page_url.unwrap_or_default(),
        flash_success,
        flash_error,
    };
    (jar, tmpl).into_response()
}

/// POST /admin/settings
pub async fn save_settings(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<SettingsForm>,
) -> Response {
    let settings = match RedirectSettings::from_input(&form.countdown, form.ui_page_url.as_deref()) {
        Ok(s) => s,
        Err(e) => return set_flash_and_redirect(jar, None, Some(&e.user_message()), "/admin/settings"),
    };

    if let Err(e) = db::save_settings(&state.db, &settings).await {
        tracing::error!("Failed to save settings: {:?}", e);
        return set_flash_and_redirect(jar, None, Some("Failed to save settings."), "/admin/settings");
    }

    tracing::info!(
        "Redirect settings updated: countdown={}s, custom page={:?}",
        settings.countdown_seconds,
        settings.ui_page_url
    );
    *state.settings.write().await = settings;

    set_flash_and_redirect(jar, Some("Settings saved."), None, "/admin/settings")
}

// ── CSV ────────────────────────────────────────────────────────────────────

/// GET /admin/export
pub async fn export_links(_auth: AuthUser, State(state): State<Arc<AppState>>) -> Response {
    let csv = match db::all_links(&state.db).await {
        Ok(links) => csv_transfer::export_links(&links),
        Err(e) => {
            tracing::error!("Failed to load links for export: {:?}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export links.").into_response();
        }
    };

    match csv {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", csv_transfer::export_filename()),
                ),
                (header::CACHE_CONTROL, "no-cache".to_owned()),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to write CSV: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to export links.").into_response()
        }
    }
}

/// POST /admin/import  (multipart: csv_file, import_mode = skip | update)
pub async fn import_links(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Response {
    let mut data = None;
    let mut policy = ConflictPolicy::Skip;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Malformed import upload: {:?}", e);
                return set_flash_and_redirect(jar, None, Some("Error uploading file."), "/admin/dashboard");
            }
        };

        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("csv_file") => {
                let is_csv = field
                    .file_name()
                    .is_some_and(|name| name.to_lowercase().ends_with(".csv"));
                if !is_csv {
                    return set_flash_and_redirect(
                        jar,
                        None,
                        Some("Invalid file type. Please upload a CSV file."),
                        "/admin/dashboard",
                    );
                }
                match field.bytes().await {
                    Ok(bytes) => data = Some(bytes),
                    Err(e) => {
                        tracing::warn!("Failed to read import upload: {:?}", e);
                        return set_flash_and_redirect(jar, None, Some("Error reading file."), "/admin/dashboard");
                    }
                }
            }
            Some("import_mode") => {
                let mode = field.text().await.unwrap_or_default();
                policy = ConflictPolicy::from_input(Some(&mode));
            }
            _ => {}
        }
    }

    let Some(data) = data else {
        return set_flash_and_redirect(jar, None, Some("Error uploading file."), "/admin/dashboard");
    };

    match csv_transfer::import_links(&state.db, &data, policy, state.config.slug_length).await {
        Ok(report) => {
            let mut msg = format!(
                "Import finished: {} imported, {} updated, {} skipped.",
                report.imported, report.updated, report.skipped
            );
            if !report.errors.is_empty() {
                let shown: Vec<&str> = report.errors.iter().take(5).map(String::as_str).collect();
                msg.push(' ');
                msg.push_str(&shown.join("; "));
            }
            set_flash_and_redirect(jar, Some(&msg), None, "/admin/dashboard")
        }
        Err(e) => {
            tracing::error!("CSV import failed: {:?}", e);
            let msg = match e {
                csv_transfer::ImportError::Link(_) => "Database error during import.".to_owned(),
                other => other.to_string(),
            };
            set_flash_and_redirect(jar, None, Some(&msg), "/admin/dashboard")
        }
    }
}

// ── Link picker ────────────────────────────────────────────────────────────

/// GET /admin/api/links
/// Snapshot of active links for the embeddable link picker. Read-only.
pub async fn picker_links(_auth: AuthUser, State(state): State<Arc<AppState>>) -> Response {
    match db::active_links(&state.db, PICKER_LIMIT).await {
        Ok(links) => {
            let links: Vec<PickerLink> = links
                .into_iter()
                .map(|l| PickerLink {
                    short_url: state.config.short_url(&l.slug),
                    id: l.id,
                    slug: l.slug,
                    title: l.title,
                    target_url: l.target_url,
                })
                .collect();
            Json(links).into_response()
        }
        Err(e) => {
            tracing::error!("Failed to load picker links: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load links").into_response()
        }
    }
}

// ── Private helpers ────────────────────────────────────────────────────────

/// Comma-separated ids; junk and non-positive values are dropped.
fn parse_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .collect()
}

/// Read and clear the flash cookies.
fn take_flash(jar: CookieJar) -> (CookieJar, Option<String>, Option<String>) {
    let flash_success = jar.get("flash_success").map(|c| c.value().to_owned());
    let flash_error = jar.get("flash_error").map(|c| c.value().to_owned());

    let jar = jar
        .remove(Cookie::build(("flash_success", "")).path("/").build())
        .remove(Cookie::build(("flash_error", "")).path("/").build());

    (jar, flash_success, flash_error)
}

/// Set a flash cookie and redirect to the given path.
fn set_flash_and_redirect(
    jar: CookieJar,
    success: Option<&str>,
    error: Option<&str>,
    destination: &str,
) -> Response {
    let mut jar = jar;

    for (name, msg) in [("flash_success", success), ("flash_error", error)] {
        if let Some(msg) = msg {
            let c = Cookie::build((name, msg.to_owned()))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::seconds(30))
                .build();
            jar = jar.add(c);
        }
    }

    (jar, Redirect::to(destination)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{routes, test_utils::{new_link, test_state}};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn send(state: Arc<AppState>, request: Request<Body>) -> Response {
        routes::router(state).oneshot(request).await.unwrap()
    }

    async fn session_cookie(state: &AppState) -> String {
        format!("{}={}", SESSION_COOKIE, state.sessions.create().await)
    }

    fn form_post(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[test]
    fn ids_are_parsed_leniently() {
        assert_eq!(parse_ids("1, 2,x,,-3,0,40"), vec![1, 2, 40]);
        assert!(parse_ids("").is_empty());
    }

    #[tokio::test]
    async fn admin_pages_require_login() {
        let state = test_state().await;
        let response = send(
            state,
            Request::builder().uri("/admin/dashboard").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/admin/login");
    }

    #[tokio::test]
    async fn login_sets_session_cookie() {
        let state = test_state().await;
        let response = send(state.clone(), form_post("/admin/login", "", "password=hunter2")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_owned();
        let token = set_cookie
            .strip_prefix(&format!("{SESSION_COOKIE}="))
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        assert!(state.sessions.is_valid(token).await);
    }

    #[tokio::test]
    async fn create_form_generates_slug_and_lists_it() {
        let state = test_state().await;
        let cookie = session_cookie(&state).await;

        let response = send(
            state.clone(),
            form_post(
                "/admin/links",
                &cookie,
                "target_url=https%3A%2F%2Fexample.com&slug=&title=Example&mode=ui&is_active=on",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let links = db::all_links(&state.db).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].slug.len(), 6);
        assert_eq!(links[0].mode, LinkMode::Ui);
        assert!(links[0].is_active);

        let dashboard = send(
            state.clone(),
            Request::builder()
                .uri("/admin/dashboard")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(dashboard.status(), StatusCode::OK);
        let html = to_bytes(dashboard.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(html.to_vec()).unwrap();
        assert!(html.contains(&format!("https://sho.rt/go/{}", links[0].slug)));
    }

    #[tokio::test]
    async fn conflicting_create_writes_nothing() {
        let state = test_state().await;
        db::create_link(&state.db, &new_link("taken", "https://a.example"), 6)
            .await
            .unwrap();
        let cookie = session_cookie(&state).await;

        let response = send(
            state.clone(),
            form_post("/admin/links", &cookie, "target_url=https%3A%2F%2Fb.example&slug=taken"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .starts_with("flash_error="));
        assert_eq!(db::all_links(&state.db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bulk_disable_and_toggle() {
        let state = test_state().await;
        let a = db::create_link(&state.db, &new_link("a", "https://a.example"), 6).await.unwrap();
        let b = db::create_link(&state.db, &new_link("b", "https://b.example"), 6).await.unwrap();
        let cookie = session_cookie(&state).await;

        send(
            state.clone(),
            form_post("/admin/links/bulk", &cookie, &format!("action=disable&link_ids={}%2C{}", a.id, b.id)),
        )
        .await;
        assert!(db::active_links(&state.db, 10).await.unwrap().is_empty());

        send(state.clone(), form_post(&format!("/admin/links/{}/toggle", a.id), &cookie, "")).await;
        let active = db::active_links(&state.db, 10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].slug, "a");
    }

    #[tokio::test]
    async fn settings_update_changes_resolution() {
        let state = test_state().await;
        let cookie = session_cookie(&state).await;

        send(state.clone(), form_post("/admin/settings", &cookie, "countdown=3&ui_page_url=")).await;
        assert_eq!(state.settings.read().await.countdown_seconds, 3);

        let persisted = db::load_settings(&state.db, RedirectSettings {
            countdown_seconds: 10,
            ui_page_url: None,
        })
        .await
        .unwrap();
        assert_eq!(persisted.countdown_seconds, 3);
    }

    #[tokio::test]
    async fn picker_lists_active_links_only() {
        let state = test_state().await;
        db::create_link(&state.db, &new_link("on", "https://on.example"), 6).await.unwrap();
        let off = db::create_link(&state.db, &new_link("off", "https://off.example"), 6).await.unwrap();
        db::set_active(&state.db, off.id, false).await.unwrap();
        let cookie = session_cookie(&state).await;

        let response = send(
            state,
            Request::builder()
                .uri("/admin/api/links")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let items = json.as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["slug"], "on");
        assert_eq!(items[0]["short_url"], "https://sho.rt/go/on");
    }

    #[tokio::test]
    async fn export_returns_csv_attachment() {
        let state = test_state().await;
        db::create_link(&state.db, &new_link("promo", "https://example.com"), 6).await.unwrap();
        let cookie = session_cookie(&state).await;

        let response = send(
            state,
            Request::builder()
                .uri("/admin/export")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=golinks-export-"));
    }
}
