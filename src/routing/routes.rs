//! Route-pattern matching and per-request classification.

use crate::config::{LocaleConfig, RouteConfig};

/// Paths the access gate never looks at: API and framework/static prefixes,
/// and anything that looks like a file.
const EXCLUDED_PREFIXES: &[&str] = &["api", "trpc", "_next", "_vercel"];

/// Whether `path` matches any of `routes`.
///
/// A route matches itself, anything below it (`route/…`), and both forms
/// with a supported locale prepended.
pub fn matches_route(path: &str, routes: &[String], locales: &[String]) -> bool {
    routes.iter().any(|route| {
        if matches_one(path, route) {
            return true;
        }
        locales.iter().any(|locale| {
            path.strip_prefix('/')
                .and_then(|p| p.strip_prefix(locale.as_str()))
                .is_some_and(|rest| matches_one(rest, route))
        })
    })
}

fn matches_one(path: &str, route: &str) -> bool {
    path == route
        || path
            .strip_prefix(route)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Whether the access gate should skip `path` entirely.
pub fn is_excluded(path: &str) -> bool {
    let rest = path.strip_prefix('/').unwrap_or(path);
    EXCLUDED_PREFIXES.iter().any(|p| rest.starts_with(p)) || rest.contains('.')
}

/// Which gated route sets a request path falls into. Derived per request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteClassification {
    pub non_auth: bool,
    pub auth_protected: bool,
    pub onboarding_protected: bool,
}

impl RouteClassification {
    pub fn classify(path: &str, routes: &RouteConfig, locale: &LocaleConfig) -> Self {
        Self {
            non_auth: matches_route(path, &routes.non_auth, &locale.locales),
            auth_protected: matches_route(path, &routes.auth_protected, &locale.locales),
            onboarding_protected: matches_route(
                path,
                &routes.onboarding_protected,
                &locale.locales,
            ),
        }
    }

    pub fn is_gated(&self) -> bool {
        self.non_auth || self.auth_protected || self.onboarding_protected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_prefix_and_locale_forms() {
        let routes = strings(&["/dashboard"]);
        let locales = strings(&["en", "es"]);

        for path in [
            "/dashboard",
            "/dashboard/org",
            "/dashboard/org/42",
            "/en/dashboard",
            "/es/dashboard/platforms/7",
        ] {
            assert!(matches_route(path, &routes, &locales), "{path} should match");
        }

        for path in [
            "/dashboards",
            "/en/dashboards",
            "/fr/dashboard",
            "/onboarding",
            "/",
            "/en",
        ] {
            assert!(!matches_route(path, &routes, &locales), "{path} should not match");
        }
    }

    #[test]
    fn classification_uses_configured_sets() {
        let routes = RouteConfig::default();
        let locale = LocaleConfig::default();

        let sign_in = RouteClassification::classify("/en/sign-in", &routes, &locale);
        assert!(sign_in.non_auth && !sign_in.auth_protected && !sign_in.onboarding_protected);

        let onboarding = RouteClassification::classify("/es/onboarding", &routes, &locale);
        assert!(onboarding.auth_protected && !onboarding.onboarding_protected);

        let dashboard = RouteClassification::classify("/en/dashboard/org", &routes, &locale);
        assert!(dashboard.onboarding_protected && !dashboard.auth_protected);

        let home = RouteClassification::classify("/en", &routes, &locale);
        assert!(!home.is_gated());
    }

    #[test]
    fn exclusions() {
        for path in [
            "/api/auth/request-otp",
            "/_next/static/chunk.js",
            "/_vercel/insights",
            "/trpc/x",
            "/favicon.ico",
            "/en/logo.svg",
        ] {
            assert!(is_excluded(path), "{path} should be excluded");
        }
        for path in ["/", "/en", "/en/dashboard", "/sign-in"] {
            assert!(!is_excluded(path), "{path} should be gated");
        }
    }
}
