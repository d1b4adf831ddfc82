use super::cookie::{self, LOGIN_PATH};
use super::SessionManager;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// All `Cookie` headers of a request joined into one value
fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}

/// Middleware that only lets requests with a valid admin session through.
///
/// The decoded `SessionRecord` is added to the request extensions; requests
/// without one are redirected to the login page.
pub async fn require_session(
    State(manager): State<SessionManager>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookies = cookie_header(request.headers());

    match manager.session_from_cookies(cookies.as_deref()) {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "Request without a valid session");
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

pub async fn login(
    State(manager): State<SessionManager>,
    Json(body): Json<LoginRequest>,
) -> Response {
    if !manager.check_credentials(&body.username, &body.password) {
        tracing::warn!(username = %body.username, "Rejected admin login");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "Invalid credentials" })),
        )
            .into_response();
    }

    let issued = manager.issue(&body.username, body.remember_me);
    let set_cookie =
        cookie::session_cookie(&issued.token, body.remember_me, issued.record.login_time);

    tracing::info!(username = %body.username, remember_me = body.remember_me, "Admin logged in");

    (
        [(header::SET_COOKIE, set_cookie)],
        Json(json!({
            "success": true,
            "username": issued.record.username,
            "expiresAt": issued.record.expires_at,
        })),
    )
        .into_response()
}

pub async fn logout() -> Response {
    let out = cookie::logout();
    ([(header::SET_COOKIE, out.set_cookie)], Redirect::to(out.redirect_to)).into_response()
}

/// Login and logout endpoints
pub fn router(manager: SessionManager) -> Router {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_header_joins_values() {
        let mut headers = HeaderMap::new();
        assert_eq!(cookie_header(&headers), None);

        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("airo-auth-session=t.0"));
        assert_eq!(
            cookie_header(&headers),
            Some("a=1; airo-auth-session=t.0".to_string())
        );
    }

    #[test]
    fn test_login_request_defaults_remember_me() {
        let body: LoginRequest =
            serde_json::from_str(r#"{"username":"admin","password":"pw"}"#).unwrap();
        assert!(!body.remember_me);

        let body: LoginRequest =
            serde_json::from_str(r#"{"username":"admin","password":"pw","rememberMe":true}"#)
                .unwrap();
        assert!(body.remember_me);
    }
}
