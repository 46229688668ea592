//! Session cookies and the per-request guard resolver.
//!
//! Cookies are parsed and emitted by hand; the resolver walks the guard
//! resolution order and pins the first guard holding a live session.

use axum::{
    extract::{Extension, Request},
    http::{header::COOKIE, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sqlx::PgPool;

use super::principal::{ActiveSession, CurrentUser, Guard};
use super::state::AuthConfig;
use super::storage;
use super::utils::hash_session_token;

/// Stash for the URL an unauthenticated request tried to reach.
pub(super) const INTENDED_COOKIE: &str = "medgate_intended";

/// Extract one cookie value out of the Cookie header.
pub(super) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
        .next()
}

fn cookie_string(config: &AuthConfig, name: &str, value: &str, max_age: i64) -> String {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.session_cookie_secure() {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Set-Cookie value establishing a session under one guard.
pub(super) fn session_cookie(config: &AuthConfig, guard: Guard, token: &str) -> String {
    cookie_string(config, guard.cookie_name(), token, config.session_ttl_seconds())
}

/// Set-Cookie value expiring the session cookie of one guard.
pub(super) fn clear_session_cookie(config: &AuthConfig, guard: Guard) -> String {
    cookie_string(config, guard.cookie_name(), "", 0)
}

/// Set-Cookie value stashing the path to return to after login.
pub(super) fn stash_intended_cookie(config: &AuthConfig, path: &str) -> String {
    cookie_string(config, INTENDED_COOKIE, path, 600)
}

pub(super) fn clear_intended_cookie(config: &AuthConfig) -> String {
    cookie_string(config, INTENDED_COOKIE, "", 0)
}

/// Accept only local absolute paths as post-login redirect targets.
/// Anything else, including protocol-relative `//host` values, is discarded.
pub(super) fn sanitize_redirect(path: &str) -> Option<String> {
    if path.starts_with('/') && !path.starts_with("//") {
        Some(path.to_string())
    } else {
        None
    }
}

/// The stashed intended path, if any survives sanitation.
pub(super) fn intended_path(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, INTENDED_COOKIE).and_then(|path| sanitize_redirect(&path))
}

/// Middleware resolving the current principal for web routes.
///
/// Guards are tried in resolution order; the first cookie matching a live
/// session of its own guard wins. A `CurrentUser` extension is inserted on
/// every request, holding `None` when no guard matched.
pub async fn resolve(
    Extension(pool): Extension<PgPool>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut current = CurrentUser::default();

    for guard in Guard::RESOLUTION_ORDER {
        let Some(token) = cookie_value(request.headers(), guard.cookie_name()) else {
            continue;
        };
        let token_hash = hash_session_token(&token);

        let row = match storage::lookup_session(&pool, &token_hash).await {
            Ok(row) => row,
            Err(err) => {
                tracing::error!("session lookup failed: {err:#}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        // A cookie presented under one guard never resolves a session row
        // created by another.
        let Some(row) = row.filter(|row| row.guard == guard) else {
            continue;
        };

        let principal = match storage::load_principal(&pool, guard, row.principal_id).await {
            Ok(principal) => principal,
            Err(err) => {
                tracing::error!("principal load failed: {err:#}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        if let Some(principal) = principal {
            tracing::debug!(
                guard = guard.as_str(),
                principal = %principal.id(),
                "session resolved"
            );
            current = CurrentUser(Some(ActiveSession {
                principal,
                guard,
                token_hash,
                twofa_passed: row.twofa_passed,
            }));
            break;
        }
    }

    request.extensions_mut().insert(current);
    next.run(request).await
}
