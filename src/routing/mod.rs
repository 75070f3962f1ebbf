//! Request routing: locale prefixing, tenant subdomains, access gating.

pub mod locale;
pub mod middleware;
pub mod policy;
pub mod routes;
pub mod subdomain;

use axum::Router;

pub use locale::{locale_redirect, path_locale};
pub use middleware::{GateState, access_gate};
pub use policy::{
    AccessPolicy, DASHBOARD_PATH, ONBOARDING_PATH, RequestContext, RouteDecision, SIGN_IN_PATH,
    tenant_path,
};
pub use routes::{RouteClassification, is_excluded, matches_route};
pub use subdomain::extract_subdomain;

/// Wrap `router` so the access gate sees each request before route matching.
pub fn gate(router: Router, state: GateState) -> Router {
    Router::new()
        .fallback_service(router)
        .layer(axum::middleware::from_fn_with_state(state, access_gate))
}
