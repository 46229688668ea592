//! Bearer token surface: API login, refresh and logout.
//!
//! Only generic accounts authenticate here. Every verification failure
//! collapses into one public error code; the distinction between expired,
//! tampered and malformed tokens stays in the logs.

use axum::{
    extract::Extension,
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::envelope::{ApiFailure, ApiSuccess, ErrorCode};
use super::principal::{AccountRecord, Guard};
use super::state::AuthState;
use super::storage;
use super::types::{ApiLoginRequest, TokenResponse};
use super::utils::{normalize_email, valid_email, verify_password};
use crate::token;

/// The bearer token out of the Authorization header, if present.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Resolve the account behind a bearer token.
///
/// Missing tokens and invalid tokens report distinct codes; every reason a
/// token can be invalid reports the same one.
pub(crate) async fn require_account(
    pool: &PgPool,
    state: &AuthState,
    headers: &HeaderMap,
) -> Result<AccountRecord, ApiFailure> {
    let Some(bearer) = bearer_token(headers) else {
        return Err(ApiFailure::new(ErrorCode::TokenNotProvided));
    };

    let claims = token::verify(state.config().token_secret_bytes(), &bearer).map_err(|err| {
        tracing::debug!("bearer token rejected: {err}");
        ApiFailure::new(ErrorCode::InvalidOrExpiredToken)
    })?;
    let account_id = claims.subject().map_err(|err| {
        tracing::debug!("bearer token rejected: {err}");
        ApiFailure::new(ErrorCode::InvalidOrExpiredToken)
    })?;

    match storage::account_by_id(pool, account_id).await {
        Ok(Some(account)) => Ok(account),
        // A valid signature over a deleted account still fails closed.
        Ok(None) => Err(ApiFailure::new(ErrorCode::InvalidOrExpiredToken)),
        Err(err) => {
            tracing::error!("account lookup failed: {err:#}");
            Err(ApiFailure::new(ErrorCode::ServerError))
        }
    }
}

fn validate_login(request: &ApiLoginRequest) -> Result<(String, String), ApiFailure> {
    let mut errors = BTreeMap::new();

    let email = request
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty());
    match &email {
        None => {
            errors.insert(
                "email".to_string(),
                "The email field is required.".to_string(),
            );
        }
        Some(email) if !valid_email(email) => {
            errors.insert(
                "email".to_string(),
                "The email must be a valid email address.".to_string(),
            );
        }
        Some(_) => {}
    }

    let password = request
        .password
        .as_deref()
        .filter(|password| !password.is_empty());
    if password.is_none() {
        errors.insert(
            "password".to_string(),
            "The password field is required.".to_string(),
        );
    }

    match (email, password) {
        (Some(email), Some(password)) if errors.is_empty() => {
            Ok((email, password.to_string()))
        }
        _ => Err(ApiFailure::validation(errors)),
    }
}

fn mint_token(state: &AuthState, account_id: uuid::Uuid) -> Result<TokenResponse, ApiFailure> {
    let ttl = state.config().token_ttl_seconds();
    token::sign(state.config().token_secret_bytes(), account_id, ttl)
        .map(|minted| TokenResponse::new(minted, ttl))
        .map_err(|err| {
            tracing::error!("token signing failed: {err}");
            ApiFailure::new(ErrorCode::ServerError)
        })
}

/// POST /api/login
pub async fn login(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<ApiLoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiFailure::validation(BTreeMap::from([(
            "body".to_string(),
            "A JSON body is required.".to_string(),
        )]))
        .into_response();
    };

    let (email, password) = match validate_login(&request) {
        Ok(credentials) => credentials,
        Err(failure) => return failure.into_response(),
    };

    let record = match storage::credentials(&pool, Guard::Web, &email).await {
        Ok(record) => record,
        Err(err) => {
            tracing::error!("credential lookup failed: {err:#}");
            return ApiFailure::new(ErrorCode::ServerError).into_response();
        }
    };

    // Unknown email and wrong password are indistinguishable to the client.
    let Some(record) = record else {
        return ApiFailure::new(ErrorCode::LoginFailed).into_response();
    };
    if !verify_password(&password, &record.password_hash) {
        return ApiFailure::new(ErrorCode::LoginFailed).into_response();
    }

    match mint_token(&state, record.id) {
        Ok(minted) => match serde_json::to_value(&minted) {
            Ok(data) => ApiSuccess::new("Logged in").with_data(data).into_response(),
            Err(err) => {
                tracing::error!("token response encoding failed: {err}");
                ApiFailure::new(ErrorCode::ServerError).into_response()
            }
        },
        Err(failure) => failure.into_response(),
    }
}

/// POST /api/refresh
pub async fn refresh(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Response {
    let account = match require_account(&pool, &state, &headers).await {
        Ok(account) => account,
        Err(failure) => return failure.into_response(),
    };

    match mint_token(&state, account.id) {
        Ok(minted) => match serde_json::to_value(&minted) {
            Ok(data) => ApiSuccess::new("Token refreshed")
                .with_data(data)
                .into_response(),
            Err(err) => {
                tracing::error!("token response encoding failed: {err}");
                ApiFailure::new(ErrorCode::ServerError).into_response()
            }
        },
        Err(failure) => failure.into_response(),
    }
}

/// POST /api/logout
///
/// Tokens are stateless, so logout only acknowledges; the token stays valid
/// until expiry and clients are expected to discard it.
pub async fn logout(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(failure) = require_account(&pool, &state, &headers).await {
        return failure.into_response();
    }

    ApiSuccess::new("Logged out")
        .with_data(json!({}))
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_auth(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_token_parses_scheme() {
        assert_eq!(
            bearer_token(&headers_with_auth("Bearer abc.def.ghi")),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(
            bearer_token(&headers_with_auth("bearer abc")),
            Some("abc".to_string())
        );
    }

    #[test]
    fn bearer_token_rejects_other_schemes_and_empty() {
        assert_eq!(bearer_token(&headers_with_auth("Basic abc")), None);
        assert_eq!(bearer_token(&headers_with_auth("Bearer ")), None);
        assert_eq!(bearer_token(&headers_with_auth("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn validate_login_requires_both_fields() {
        let failure = validate_login(&ApiLoginRequest {
            email: None,
            password: None,
        })
        .expect_err("must fail");
        assert_eq!(failure.code(), ErrorCode::ValidationFailed);

        let failure = validate_login(&ApiLoginRequest {
            email: Some("a@b.co".to_string()),
            password: Some(String::new()),
        })
        .expect_err("must fail");
        assert_eq!(failure.code(), ErrorCode::ValidationFailed);
    }

    #[test]
    fn validate_login_rejects_bad_email() {
        let failure = validate_login(&ApiLoginRequest {
            email: Some("not-an-email".to_string()),
            password: Some("pw".to_string()),
        })
        .expect_err("must fail");
        assert_eq!(failure.code(), ErrorCode::ValidationFailed);
    }

    #[test]
    fn validate_login_normalizes_email() {
        let (email, password) = validate_login(&ApiLoginRequest {
            email: Some(" Admin@Clinic.TEST ".to_string()),
            password: Some("pw".to_string()),
        })
        .expect("must pass");
        assert_eq!(email, "admin@clinic.test");
        assert_eq!(password, "pw");
    }
}
