//! Axum middleware running the access policy in front of every route.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Uri;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::warn;

use super::policy::{AccessPolicy, RequestContext, RouteDecision};
use super::routes::is_excluded;

/// Shared state for [`access_gate`].
#[derive(Clone)]
pub struct GateState {
    pub policy: Arc<AccessPolicy>,
    pub session_cookie: String,
}

impl GateState {
    pub fn new(policy: Arc<AccessPolicy>, session_cookie: impl Into<String>) -> Self {
        Self {
            policy,
            session_cookie: session_cookie.into(),
        }
    }
}

/// Redirect, rewrite or forward the request according to the policy.
///
/// Must run before routing so a rewritten URI selects the tenant handlers.
pub async fn access_gate(State(gate): State<GateState>, mut request: Request, next: Next) -> Response {
    if is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let ctx = RequestContext::from_request(&request, &gate.session_cookie);
    match gate.policy.decide(&ctx).await {
        RouteDecision::Redirect(target) => Redirect::temporary(&target).into_response(),
        RouteDecision::Rewrite(target) => {
            match target.parse::<Uri>() {
                Ok(uri) => *request.uri_mut() = uri,
                Err(e) => warn!(path = %ctx.path, rewrite_to = %target, error = %e, "Invalid rewrite target"),
            }
            next.run(request).await
        }
        RouteDecision::PassThrough => next.run(request).await,
    }
}
