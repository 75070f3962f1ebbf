//! Locale prefixing. Every page path starts with a supported locale.

use crate::config::LocaleConfig;

/// Supported locale carried by `path`'s first segment, if any.
pub fn path_locale<'a>(path: &'a str, config: &LocaleConfig) -> Option<&'a str> {
    let first = path.strip_prefix('/')?.split('/').next()?;
    config.is_supported(first).then_some(first)
}

/// Where to send a request whose path lacks a locale. `None` when the path
/// is already prefixed.
pub fn locale_redirect(path: &str, query: Option<&str>, config: &LocaleConfig) -> Option<String> {
    if path_locale(path, config).is_some() {
        return None;
    }
    let rest = if path == "/" { "" } else { path };
    let mut target = format!("/{}{}", config.default_locale, rest);
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(q);
    }
    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_paths_pass() {
        let config = LocaleConfig::default();
        assert_eq!(path_locale("/en/dashboard", &config), Some("en"));
        assert_eq!(path_locale("/es", &config), Some("es"));
        assert_eq!(locale_redirect("/es/sign-in", None, &config), None);
    }

    #[test]
    fn unprefixed_paths_get_default_locale() {
        let config = LocaleConfig::default();
        assert_eq!(locale_redirect("/", None, &config).as_deref(), Some("/en"));
        assert_eq!(
            locale_redirect("/dashboard", Some("tab=orgs"), &config).as_deref(),
            Some("/en/dashboard?tab=orgs")
        );
        // Unsupported locale is treated as an ordinary path segment.
        assert_eq!(
            locale_redirect("/fr/dashboard", None, &config).as_deref(),
            Some("/en/fr/dashboard")
        );
    }
}
