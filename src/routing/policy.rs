//! Request-time access policy: tenant rewrite, auth/onboarding gating.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::HOST;
use tracing::{debug, warn};

use super::locale::locale_redirect;
use super::routes::RouteClassification;
use super::subdomain::extract_subdomain;
use crate::config::{AppConfig, DomainConfig, LocaleConfig, RouteConfig};
use crate::identity::{IdentityProvider, SessionToken, User};

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const ONBOARDING_PATH: &str = "/onboarding";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Outcome of running the policy over one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Serve this path (and query) instead, without telling the browser.
    Rewrite(String),
    /// Send the browser elsewhere (HTTP 307).
    Redirect(String),
    PassThrough,
}

/// The parts of a request the policy looks at.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Full URL as the browser addressed it.
    pub url: String,
    /// Raw `Host` header.
    pub host: String,
    pub path: String,
    pub query: Option<String>,
    pub session: Option<SessionToken>,
}

impl RequestContext {
    pub fn from_request(req: &Request, session_cookie: &str) -> Self {
        let host = req
            .headers()
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| req.uri().authority().map(|a| a.to_string()))
            .unwrap_or_default();
        let scheme = req
            .headers()
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        Self {
            url: format!("{scheme}://{host}{path_and_query}"),
            host,
            path: req.uri().path().to_string(),
            query: req.uri().query().map(str::to_string),
            session: SessionToken::from_headers(req.headers(), session_cookie),
        }
    }
}

/// Insert the tenant segment after the locale: `/{locale}/{rest}` becomes
/// `/{locale}/t/{tenant}/{rest}`.
pub fn tenant_path(path: &str, tenant: &str) -> String {
    let Some(rest) = path.strip_prefix('/') else {
        return path.to_string();
    };
    let (locale, tail) = match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    if locale.is_empty() {
        return path.to_string();
    }
    format!("/{locale}/t/{tenant}{tail}")
}

/// Decides, per request, between rewrite, redirect and pass-through.
///
/// Stateless between requests. Session and profile are fetched fresh each
/// time; lookup failures count as "signed out" / "no profile".
pub struct AccessPolicy {
    identity: Arc<dyn IdentityProvider>,
    domain: DomainConfig,
    locale: LocaleConfig,
    routes: RouteConfig,
}

impl AccessPolicy {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        domain: DomainConfig,
        locale: LocaleConfig,
        routes: RouteConfig,
    ) -> Self {
        Self {
            identity,
            domain,
            locale,
            routes,
        }
    }

    pub fn from_config(identity: Arc<dyn IdentityProvider>, config: &AppConfig) -> Self {
        Self::new(
            identity,
            config.domain.clone(),
            config.locale.clone(),
            config.routes.clone(),
        )
    }

    pub fn locale(&self) -> &LocaleConfig {
        &self.locale
    }

    async fn current_user(&self, session: Option<&SessionToken>) -> Option<User> {
        let token = session?;
        match self.identity.get_current_user(token.expose()).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Session lookup failed; treating request as signed out");
                None
            }
        }
    }

    async fn is_onboarded(&self, session: Option<&SessionToken>, user: &User) -> bool {
        let Some(token) = session else {
            return false;
        };
        match self.identity.get_profile_by_id(token.expose(), user.id).await {
            Ok(profile) => profile.is_some_and(|p| p.is_onboarded()),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Profile lookup failed; treating as not onboarded");
                false
            }
        }
    }

    pub async fn decide(&self, req: &RequestContext) -> RouteDecision {
        if let Some(target) = locale_redirect(&req.path, req.query.as_deref(), &self.locale) {
            debug!(path = %req.path, redirect_to = %target, "Locale redirect");
            return RouteDecision::Redirect(target);
        }

        if let Some(tenant) = extract_subdomain(&req.url, &req.host, &self.domain) {
            let mut target = tenant_path(&req.path, &tenant);
            if let Some(q) = req.query.as_deref() {
                target.push('?');
                target.push_str(q);
            }
            debug!(path = %req.path, subdomain = %tenant, rewrite_to = %target, "Tenant rewrite");
            return RouteDecision::Rewrite(target);
        }

        let class = RouteClassification::classify(&req.path, &self.routes, &self.locale);
        if !class.is_gated() {
            return RouteDecision::PassThrough;
        }

        let session = req.session.as_ref();
        let Some(user) = self.current_user(session).await else {
            return if class.non_auth {
                RouteDecision::PassThrough
            } else {
                debug!(path = %req.path, "Signed out; redirecting to sign-in");
                RouteDecision::Redirect(SIGN_IN_PATH.to_string())
            };
        };
        let onboarded = self.is_onboarded(session, &user).await;

        let target = if class.non_auth {
            Some(if onboarded { DASHBOARD_PATH } else { ONBOARDING_PATH })
        } else if class.onboarding_protected {
            (!onboarded).then_some(ONBOARDING_PATH)
        } else {
            onboarded.then_some(DASHBOARD_PATH)
        };

        match target {
            Some(target) => {
                debug!(path = %req.path, user_id = %user.id, onboarded, redirect_to = target, "Access redirect");
                RouteDecision::Redirect(target.to_string())
            }
            None => RouteDecision::PassThrough,
        }
    }
}
