//! Configuration types.

use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Route-pattern lists consumed by the access policy.
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Require a session and a completed profile (`full_name`).
    pub onboarding_protected: Vec<String>,
    /// Require a session only.
    pub auth_protected: Vec<String>,
    /// Only meaningful to signed-out visitors.
    pub non_auth: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            onboarding_protected: vec!["/dashboard".to_string()],
            auth_protected: vec!["/onboarding".to_string()],
            non_auth: vec!["/sign-in".to_string(), "/sign-up".to_string()],
        }
    }
}

/// Locale settings for path prefixing.
#[derive(Debug, Clone)]
pub struct LocaleConfig {
    pub locales: Vec<String>,
    pub default_locale: String,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            locales: vec!["en".to_string(), "es".to_string()],
            default_locale: "en".to_string(),
        }
    }
}

impl LocaleConfig {
    pub fn is_supported(&self, locale: &str) -> bool {
        self.locales.iter().any(|l| l == locale)
    }
}

/// Host-name settings used to resolve tenant subdomains.
#[derive(Debug, Clone)]
pub struct DomainConfig {
    /// Base domain tenants live under. May carry a port (`localhost:3000`).
    pub root_domain: String,
    /// Preview deployment host suffix, e.g. `.vercel.app`.
    pub preview_suffix: String,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            root_domain: "localhost:3000".to_string(),
            preview_suffix: ".vercel.app".to_string(),
        }
    }
}

/// Connection settings for the hosted identity/database backend.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub url: String,
    pub anon_key: SecretString,
    pub request_timeout: Duration,
}

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub domain: DomainConfig,
    pub locale: LocaleConfig,
    pub routes: RouteConfig,
    pub identity: IdentityConfig,
    /// Cookie carrying the session access token.
    pub session_cookie: String,
    /// Minimum wait between OTP sends.
    pub otp_cooldown: Duration,
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env_or("PORTAL_BIND_ADDR", "0.0.0.0:3000")
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "PORTAL_BIND_ADDR".to_string(),
                message: format!("{e}"),
            })?;

        let domain = DomainConfig {
            root_domain: env_or("PORTAL_ROOT_DOMAIN", "localhost:3000"),
            preview_suffix: env_or("PORTAL_PREVIEW_SUFFIX", ".vercel.app"),
        };

        let locales: Vec<String> = env_or("PORTAL_LOCALES", "en,es")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if locales.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "PORTAL_LOCALES".to_string(),
                message: "at least one locale is required".to_string(),
            });
        }
        let default_locale =
            std::env::var("PORTAL_DEFAULT_LOCALE").unwrap_or_else(|_| locales[0].clone());
        let locale = LocaleConfig {
            locales,
            default_locale,
        };
        if !locale.is_supported(&locale.default_locale) {
            return Err(ConfigError::InvalidValue {
                key: "PORTAL_DEFAULT_LOCALE".to_string(),
                message: format!("{} is not in PORTAL_LOCALES", locale.default_locale),
            });
        }

        let url = std::env::var("SUPABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("SUPABASE_URL".to_string()))?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("SUPABASE_ANON_KEY".to_string()))?;
        let request_timeout_secs: u64 = std::env::var("SUPABASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let otp_cooldown_secs: u64 = std::env::var("PORTAL_OTP_COOLDOWN_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Ok(Self {
            bind_addr,
            domain,
            locale,
            routes: RouteConfig::default(),
            identity: IdentityConfig {
                url: url.trim_end_matches('/').to_string(),
                anon_key: SecretString::from(anon_key),
                request_timeout: Duration::from_secs(request_timeout_secs),
            },
            session_cookie: env_or("PORTAL_SESSION_COOKIE", "sb-access-token"),
            otp_cooldown: Duration::from_secs(otp_cooldown_secs),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
