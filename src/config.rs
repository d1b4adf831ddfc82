use crate::secrets::{self, MIN_SESSION_SECRET_LENGTH};
use std::time::Duration;
use zeroize::Zeroizing;

pub const ADMIN_USERNAME_VAR: &str = "AIRO_ADMIN_USERNAME";
pub const ADMIN_PASSWORD_VAR: &str = "AIRO_ADMIN_PASSWORD";
pub const SESSION_SECRET_VAR: &str = "AIRO_SESSION_SECRET";
pub const BACKEND_URL_VAR: &str = "SUPABASE_URL";
pub const BACKEND_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const BACKEND_TIMEOUT_VAR: &str = "AIRO_BACKEND_TIMEOUT_SECS";

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "password";

/// Name of the cookie carrying the session token
pub const COOKIE_NAME: &str = "airo-auth-session";
/// Session lifetime without "remember me" (1 hour, milliseconds)
pub const SESSION_DURATION_MS: i64 = 60 * 60 * 1000;
/// Session lifetime with "remember me" (24 hours, milliseconds)
pub const REMEMBER_ME_DURATION_MS: i64 = 24 * 60 * 60 * 1000;

/// Admin credentials and session signing key
#[derive(Clone)]
pub struct AuthConfig {
    pub admin_username: String,
    pub admin_password: Zeroizing<String>,
    pub session_secret: Zeroizing<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("admin_username", &self.admin_username)
            .field("admin_password", &"<REDACTED>")
            .field("session_secret", &"<REDACTED>")
            .finish()
    }
}

impl AuthConfig {
    pub fn new(admin_username: &str, admin_password: &str, session_secret: &str) -> Self {
        Self {
            admin_username: admin_username.to_string(),
            admin_password: Zeroizing::new(admin_password.to_string()),
            session_secret: Zeroizing::new(session_secret.to_string()),
        }
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_username = lookup(ADMIN_USERNAME_VAR)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ADMIN_USERNAME.to_string());

        let admin_password = secrets::load_optional(&lookup, ADMIN_PASSWORD_VAR)
            .unwrap_or_else(|| Zeroizing::new(DEFAULT_ADMIN_PASSWORD.to_string()));

        if admin_password.as_str() == DEFAULT_ADMIN_PASSWORD {
            tracing::warn!(
                "{} not set, using the built-in fallback admin password",
                ADMIN_PASSWORD_VAR
            );
        }

        let session_secret = match secrets::load_optional(&lookup, SESSION_SECRET_VAR) {
            Some(secret) => {
                let strength =
                    secrets::validate_secret_strength(&secret, MIN_SESSION_SECRET_LENGTH);
                if let Err(e) = strength {
                    tracing::warn!("{}: {}", SESSION_SECRET_VAR, e);
                }
                secret
            }
            None => {
                tracing::warn!(
                    "{} not set, generated an ephemeral key; sessions will not survive a restart",
                    SESSION_SECRET_VAR
                );
                secrets::generate_session_secret()
            }
        };

        Self {
            admin_username,
            admin_password,
            session_secret,
        }
    }
}

/// Connection parameters for the hosted backend
#[derive(Clone)]
pub struct BackendConfig {
    /// Project endpoint (e.g., "https://xyz.supabase.co")
    pub url: String,
    pub api_key: Zeroizing<String>,
    /// Request timeout; the HTTP client default applies when `None`
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("api_key", &secrets::redact(&self.api_key))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BackendConfig {
    pub fn new(url: &str, api_key: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            api_key: Zeroizing::new(api_key.to_string()),
            timeout: None,
        }
    }

    /// Load from environment variables. Returns `None` when either the endpoint
    /// or the access key is missing.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = secrets::load_optional(&lookup, BACKEND_URL_VAR);
        let api_key = secrets::load_optional(&lookup, BACKEND_KEY_VAR);

        let (url, api_key) = match (url, api_key) {
            (Some(url), Some(api_key)) => (url, api_key),
            _ => {
                tracing::warn!(
                    "{} / {} not configured. Database features will be disabled.",
                    BACKEND_URL_VAR,
                    BACKEND_KEY_VAR
                );
                return None;
            }
        };

        let timeout = lookup(BACKEND_TIMEOUT_VAR).and_then(|raw| match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            Ok(_) => {
                tracing::warn!("{} must be positive, using client default", BACKEND_TIMEOUT_VAR);
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse {} '{}': {}, using client default",
                    BACKEND_TIMEOUT_VAR,
                    raw,
                    e
                );
                None
            }
        });

        let mut config = Self::new(&url, &api_key);
        config.timeout = timeout;
        Some(config)
    }
}

/// Full application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub backend: Option<BackendConfig>,
}

impl AppConfig {
    /// Load `.env` (if present) and then read the environment
    pub fn load() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }

        Self {
            auth: AuthConfig::from_env(),
            backend: BackendConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_auth_defaults() {
        let config = AuthConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.admin_password.as_str(), "password");
        assert_eq!(config.session_secret.len(), 64);
    }

    #[test]
    fn test_auth_from_vars() {
        let config = AuthConfig::from_lookup(lookup_from(&[
            (ADMIN_USERNAME_VAR, "operator"),
            (ADMIN_PASSWORD_VAR, "s3cret"),
            (SESSION_SECRET_VAR, "k"),
        ]));
        assert_eq!(config.admin_username, "operator");
        assert_eq!(config.admin_password.as_str(), "s3cret");
        // short secrets are warned about, not rejected
        assert_eq!(config.session_secret.as_str(), "k");
    }

    #[test]
    fn test_backend_requires_both_values() {
        let url_only = lookup_from(&[(BACKEND_URL_VAR, "https://x.co")]);
        assert!(BackendConfig::from_lookup(url_only).is_none());
        assert!(BackendConfig::from_lookup(lookup_from(&[(BACKEND_KEY_VAR, "key")])).is_none());
        assert!(BackendConfig::from_lookup(lookup_from(&[
            (BACKEND_URL_VAR, ""),
            (BACKEND_KEY_VAR, "key"),
        ]))
        .is_none());
    }

    #[test]
    fn test_backend_from_vars() {
        let config = BackendConfig::from_lookup(lookup_from(&[
            (BACKEND_URL_VAR, "https://project.supabase.co/"),
            (BACKEND_KEY_VAR, "anon-key-value"),
            (BACKEND_TIMEOUT_VAR, "15"),
        ]))
        .unwrap();

        assert_eq!(config.url, "https://project.supabase.co");
        assert_eq!(config.api_key.as_str(), "anon-key-value");
        assert_eq!(config.timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_backend_invalid_timeout_falls_back() {
        let config = BackendConfig::from_lookup(lookup_from(&[
            (BACKEND_URL_VAR, "https://project.supabase.co"),
            (BACKEND_KEY_VAR, "anon-key-value"),
            (BACKEND_TIMEOUT_VAR, "soon"),
        ]))
        .unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = BackendConfig::new("https://x.co", "super-secret-key");
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret-key"));

        let auth = AuthConfig::new("admin", "hunter2", "signing-key");
        let printed = format!("{:?}", auth);
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("signing-key"));
    }
}
