//! Page endpoints behind the access gate.
//!
//! Each returns a small JSON description of what would be rendered.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

async fn home(Path(locale): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "page": "home", "locale": locale }))
}

async fn sign_in(Path(locale): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "page": "sign-in", "locale": locale }))
}

async fn sign_up(Path(locale): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "page": "sign-up", "locale": locale }))
}

async fn onboarding(Path(locale): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "page": "onboarding", "locale": locale }))
}

async fn dashboard(Path(locale): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "page": "dashboard", "locale": locale, "section": "" }))
}

async fn dashboard_section(Path((locale, rest)): Path<(String, String)>) -> Json<serde_json::Value> {
    Json(json!({ "page": "dashboard", "locale": locale, "section": rest }))
}

async fn tenant_home(Path((locale, tenant)): Path<(String, String)>) -> Json<serde_json::Value> {
    Json(json!({ "page": "tenant", "locale": locale, "tenant": tenant, "path": "" }))
}

async fn tenant_page(
    Path((locale, tenant, rest)): Path<(String, String, String)>,
) -> Json<serde_json::Value> {
    Json(json!({ "page": "tenant", "locale": locale, "tenant": tenant, "path": rest }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": true, "message": "Not found" })),
    )
}

/// Build the page routes. Unmatched paths get a JSON 404.
pub fn page_routes() -> Router {
    Router::new()
        .route("/{locale}", get(home))
        .route("/{locale}/sign-in", get(sign_in))
        .route("/{locale}/sign-up", get(sign_up))
        .route("/{locale}/onboarding", get(onboarding))
        .route("/{locale}/dashboard", get(dashboard))
        .route("/{locale}/dashboard/{*rest}", get(dashboard_section))
        .route("/{locale}/t/{tenant}", get(tenant_home))
        .route("/{locale}/t/{tenant}/{*rest}", get(tenant_page))
        .fallback(not_found)
}
