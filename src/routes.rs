use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::{handlers, AppState};

/// Full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let admin_router = Router::new()
        // Root of /admin → dashboard (or login redirect via AuthUser)
        .route("/", get(|| async { Redirect::to("/admin/dashboard") }))
        .route(
            "/login",
            get(handlers::admin::login_page).post(handlers::admin::login),
        )
        .route("/logout", get(handlers::admin::logout))
        .route("/dashboard", get(handlers::admin::dashboard))
        .route("/links", post(handlers::admin::create_link))
        .route("/links/bulk", post(handlers::admin::bulk_action))
        .route("/links/:id", post(handlers::admin::update_link))
        .route("/links/:id/edit", get(handlers::admin::edit_page))
        .route("/links/:id/delete", post(handlers::admin::delete_link))
        .route("/links/:id/toggle", post(handlers::admin::toggle_link))
        .route("/links/:id/analytics", get(handlers::admin::analytics))
        .route(
            "/settings",
            get(handlers::admin::settings_page).post(handlers::admin::save_settings),
        )
        .route("/export", get(handlers::admin::export_links))
        .route("/import", post(handlers::admin::import_links))
        .route("/api/links", get(handlers::admin::picker_links));

    Router::new()
        .route("/", get(handlers::admin::index))
        // Health check, no auth
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/admin", admin_router)
        .route("/go/:slug", get(handlers::redirect::go))
        .route("/go/:slug/", get(handlers::redirect::go))
        .route("/go/:slug/embed", get(handlers::redirect::embed))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_state;
    use axum::{body::Body, http::{header, Request}};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_needs_no_session() {
        let response = router(test_state().await)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn root_goes_to_configured_url() {
        let response = router(test_state().await)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::LOCATION], "https://example.org");
    }
}
