//! Tenant subdomain resolution from the request URL and `Host` header.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::DomainConfig;

static LOCAL_SUBDOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://([^./:?#@]+)\.localhost(?::\d+)?(?:[/?#]|$)")
        .expect("local subdomain pattern compiles")
});

/// Separator preview deployments put between tenant and branch.
const PREVIEW_SEPARATOR: &str = "---";

/// Hostname of `url`: the authority without credentials or port.
fn url_hostname(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let authority = authority.rsplit_once('@').map_or(authority, |(_, a)| a);
    authority.split(':').next().unwrap_or_default()
}

fn is_local(hostname: &str) -> bool {
    hostname == "localhost" || hostname.ends_with(".localhost") || hostname == "127.0.0.1"
}

/// Resolve the tenant subdomain a request is addressed to.
///
/// `url` is the full request URL, `host` the raw `Host` header (port
/// allowed). Pure: the same inputs always give the same answer.
pub fn extract_subdomain(url: &str, host: &str, domain: &DomainConfig) -> Option<String> {
    let hostname = host.split(':').next().unwrap_or_default();

    if is_local(url_hostname(url)) || is_local(hostname) {
        if let Some(label) = LOCAL_SUBDOMAIN_RE
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
        {
            return Some(label.to_string());
        }
        if hostname.ends_with(".localhost") {
            return hostname
                .split('.')
                .next()
                .filter(|s| !s.is_empty())
                .map(str::to_string);
        }
        return None;
    }

    let root = domain
        .root_domain
        .split(':')
        .next()
        .unwrap_or_default();

    if hostname.contains(PREVIEW_SEPARATOR) && hostname.ends_with(domain.preview_suffix.as_str()) {
        return hostname
            .split(PREVIEW_SEPARATOR)
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    if hostname == root || hostname == format!("www.{root}") {
        return None;
    }
    hostname
        .strip_suffix(&format!(".{root}"))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
