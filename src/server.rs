//! HTTP application assembly.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthState, auth_routes};
use crate::config::AppConfig;
use crate::error::Result;
use crate::identity::{IdentityProvider, SupabaseClient};
use crate::pages::page_routes;
use crate::routing::{self, AccessPolicy, GateState};

/// Full application: auth API and pages, behind the access gate.
pub fn build_router(identity: Arc<dyn IdentityProvider>, config: &AppConfig) -> Router {
    let auth = auth_routes(AuthState {
        identity: Arc::clone(&identity),
        session_cookie: config.session_cookie.clone(),
        otp_cooldown: config.otp_cooldown,
    })
    .layer(CorsLayer::permissive());

    let policy = Arc::new(AccessPolicy::from_config(identity, config));
    let gate = GateState::new(policy, config.session_cookie.clone());

    routing::gate(page_routes().merge(auth), gate).layer(TraceLayer::new_for_http())
}

/// Full application backed by the hosted identity service in `config`.
pub fn build_app(config: &AppConfig) -> Result<Router> {
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(SupabaseClient::new(config.identity.clone())?);
    Ok(build_router(identity, config))
}
