//! Admin session handling
//!
//! Sessions are carried in a cookie as `base64url(payload).hex(tag)`, where the
//! payload is the JSON session record and the tag is an HMAC-SHA256 over the
//! encoded payload. Only the single configured admin account can hold a session.

pub mod cookie;
pub mod middleware;

use crate::config::{AuthConfig, REMEMBER_ME_DURATION_MS, SESSION_DURATION_MS};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub use cookie::{clear_session_cookie, logout, read_session_cookie, session_cookie, Logout};
pub use middleware::{require_session, router};

type HmacSha256 = Hmac<Sha256>;

/// Claim held by a logged-in admin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub username: String,
    /// Issue time, milliseconds since epoch
    pub login_time: i64,
    /// Expiry, milliseconds since epoch
    pub expires_at: i64,
}

/// A freshly issued session and its encoded token
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub record: SessionRecord,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Malformed session token")]
    Malformed,

    #[error("Session token signature mismatch")]
    BadSignature,

    #[error("Session expired at {0}")]
    Expired(i64),

    #[error("Session belongs to unknown user: {0}")]
    UnknownUser(String),

    #[error("Invalid session signing key: {0}")]
    InvalidKey(String),
}

/// Source of the current time in milliseconds since epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.now.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Issues and verifies admin session tokens
#[derive(Clone)]
pub struct SessionManager {
    config: Arc<AuthConfig>,
    clock: Arc<dyn Clock>,
    mac: HmacSha256,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(config: AuthConfig) -> Result<Self, TokenError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: AuthConfig, clock: Arc<dyn Clock>) -> Result<Self, TokenError> {
        let mac = HmacSha256::new_from_slice(config.session_secret.as_bytes())
            .map_err(|e| TokenError::InvalidKey(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            clock,
            mac,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Session lifetime for the given "remember me" choice
    pub fn duration_millis(remember_me: bool) -> i64 {
        if remember_me {
            REMEMBER_ME_DURATION_MS
        } else {
            SESSION_DURATION_MS
        }
    }

    /// Build a session record for `username` and encode it
    pub fn issue(&self, username: &str, remember_me: bool) -> IssuedSession {
        let now = self.now_millis();
        let record = SessionRecord {
            username: username.to_string(),
            login_time: now,
            expires_at: now + Self::duration_millis(remember_me),
        };

        let token = self.encode(&record);
        tracing::debug!(
            username,
            remember_me,
            expires_at = record.expires_at,
            "Issued session token"
        );

        IssuedSession { record, token }
    }

    pub fn issue_token(&self, username: &str, remember_me: bool) -> String {
        self.issue(username, remember_me).token
    }

    fn encode(&self, record: &SessionRecord) -> String {
        let payload = serde_json::json!({
            "username": record.username,
            "loginTime": record.login_time,
            "expiresAt": record.expires_at,
        })
        .to_string();

        let encoded = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        let mut mac = self.mac.clone();
        mac.update(encoded.as_bytes());
        let tag = hex::encode(mac.finalize().into_bytes());

        format!("{}.{}", encoded, tag)
    }

    /// Check the tag and parse the payload, without expiry or user checks
    pub fn decode_token(&self, token: &str) -> Result<SessionRecord, TokenError> {
        let (encoded, tag) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        let tag = hex::decode(tag).map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(encoded.as_bytes());
        mac.verify_slice(&tag).map_err(|_| TokenError::BadSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| TokenError::Malformed)?;
        serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)
    }

    /// Full validation: tag, shape, expiry (strictly in the future) and admin username
    pub fn validate_token(&self, token: &str) -> Result<SessionRecord, TokenError> {
        let record = self.decode_token(token)?;

        if record.expires_at <= self.now_millis() {
            return Err(TokenError::Expired(record.expires_at));
        }
        if record.username != self.config.admin_username {
            return Err(TokenError::UnknownUser(record.username));
        }

        Ok(record)
    }

    /// Decoded record for a valid token, `None` otherwise
    pub fn verify_token(&self, token: &str) -> Option<SessionRecord> {
        match self.validate_token(token) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Session token rejected: {}", e);
                None
            }
        }
    }

    pub fn is_session_valid(&self, token: &str) -> bool {
        self.verify_token(token).is_some()
    }

    /// Exact, case-sensitive comparison against the configured admin pair
    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        username == self.config.admin_username && password == self.config.admin_password.as_str()
    }
}
