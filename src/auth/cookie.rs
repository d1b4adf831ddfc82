//! Session cookie helpers operating on raw `Cookie` / `Set-Cookie` header values

use super::{SessionManager, SessionRecord};
use crate::config::COOKIE_NAME;
use chrono::{DateTime, Utc};

/// Where callers should send the browser after logging out
pub const LOGIN_PATH: &str = "/login";

const EXPIRED_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Result of a logout: the cookie to send and where to redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logout {
    pub set_cookie: String,
    pub redirect_to: &'static str,
}

fn http_date(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// `Set-Cookie` value carrying `token`, expiring with the session's duration class
pub fn session_cookie(token: &str, remember_me: bool, now_millis: i64) -> String {
    let expires = now_millis + SessionManager::duration_millis(remember_me);
    format!(
        "{}={}; Expires={}; Path=/; Secure; SameSite=Strict",
        COOKIE_NAME,
        token,
        http_date(expires)
    )
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> String {
    format!("{}=; Expires={}; Path=/", COOKIE_NAME, EXPIRED_DATE)
}

/// Extract the session token from a `Cookie` header value
pub fn read_session_cookie(cookie_header: &str) -> Option<String> {
    let prefix = format!("{}=", COOKIE_NAME);
    cookie_header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(prefix.as_str()))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn logout() -> Logout {
    Logout {
        set_cookie: clear_session_cookie(),
        redirect_to: LOGIN_PATH,
    }
}

impl SessionManager {
    /// Valid session carried by a `Cookie` header, if any
    pub fn session_from_cookies(&self, cookie_header: Option<&str>) -> Option<SessionRecord> {
        let token = read_session_cookie(cookie_header?)?;
        self.verify_token(&token)
    }

    pub fn is_authenticated(&self, cookie_header: Option<&str>) -> bool {
        self.session_from_cookies(cookie_header).is_some()
    }
}
