//! Second-factor enrollment and challenge handlers for the browser surface.
//!
//! Only generic accounts on the web guard carry a second factor. Starting
//! enrollment always regenerates the secret, so an abandoned enrollment can
//! simply be restarted.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Json, Redirect, Response},
    Form,
};
use sqlx::PgPool;
use std::sync::Arc;

use super::guard::{clear_intended_cookie, intended_path};
use super::principal::{AccountRecord, CurrentUser, Principal};
use super::state::AuthState;
use super::storage;
use super::types::{OtpForm, TwoFactorSetupResponse};
use crate::totp::{self, TwoFactorState};

const SETUP_PATH: &str = "/2fa/setup";
const SETUP_FAILED_PATH: &str = "/2fa/setup?error=invalid_code";
const VERIFY_PATH: &str = "/2fa/verify";
const VERIFY_FAILED_PATH: &str = "/2fa/verify?error=invalid_code";
const DASHBOARD_PATH: &str = "/dashboard";

fn server_error(err: &anyhow::Error) -> Response {
    tracing::error!("second-factor handler failed: {err:#}");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// The second factor belongs to generic accounts on the web guard only.
/// Unauthenticated requests go to login; other principal kinds get 403.
fn require_account(current: &CurrentUser) -> Result<(AccountRecord, Vec<u8>), Response> {
    match &current.0 {
        None => Err(Redirect::to("/login").into_response()),
        Some(session) => match &session.principal {
            Principal::Account(account) => Ok((account.clone(), session.token_hash.clone())),
            Principal::Patient(_) | Principal::Staff(_) => {
                Err(StatusCode::FORBIDDEN.into_response())
            }
        },
    }
}

/// Start or restart enrollment: store a fresh pending secret and return the
/// provisioning material.
pub async fn setup_begin(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let (account, _) = match require_account(&current) {
        Ok(account) => account,
        Err(response) => return response,
    };

    let secret = totp::generate_secret();
    if let Err(err) = storage::store_totp_secret(&pool, account.id, &secret).await {
        return server_error(&err);
    }

    match totp::enrollment_material(&secret, state.config().totp_issuer(), &account.email) {
        Ok(material) => Json(TwoFactorSetupResponse {
            secret: material.secret_base32,
            otpauth_url: material.otpauth_url,
            qr_code_url: material.qr_png_base64,
        })
        .into_response(),
        Err(err) => server_error(&err),
    }
}

/// Confirm a pending enrollment with a code from the authenticator.
pub async fn setup_confirm(
    Extension(pool): Extension<PgPool>,
    Extension(current): Extension<CurrentUser>,
    Form(form): Form<OtpForm>,
) -> Response {
    let (account, token_hash) = match require_account(&current) {
        Ok(account) => account,
        Err(response) => return response,
    };

    let Some(secret) = account.totp_secret.as_deref() else {
        return Redirect::to(SETUP_PATH).into_response();
    };

    match totp::check_code(secret, &form.otp) {
        Ok(true) => {}
        Ok(false) => return Redirect::to(SETUP_FAILED_PATH).into_response(),
        Err(err) => return server_error(&err),
    }

    match storage::confirm_totp(&pool, account.id).await {
        Ok(true) => {}
        // Secret vanished between the check and the update; start over.
        Ok(false) => return Redirect::to(SETUP_PATH).into_response(),
        Err(err) => return server_error(&err),
    }

    // The session that just proved the factor is not challenged again.
    if let Err(err) = storage::mark_twofa_passed(&pool, &token_hash).await {
        return server_error(&err);
    }

    Redirect::to(DASHBOARD_PATH).into_response()
}

/// Login-time challenge for accounts with an enabled second factor.
pub async fn verify(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    Extension(current): Extension<CurrentUser>,
    headers: HeaderMap,
    Form(form): Form<OtpForm>,
) -> Response {
    let (account, token_hash) = match require_account(&current) {
        Ok(account) => account,
        Err(response) => return response,
    };

    let state_now =
        TwoFactorState::from_record(account.totp_secret.as_deref(), account.totp_confirmed);
    if state_now != TwoFactorState::Enabled {
        return Redirect::to(DASHBOARD_PATH).into_response();
    }
    let Some(secret) = account.totp_secret.as_deref() else {
        return Redirect::to(DASHBOARD_PATH).into_response();
    };

    match totp::check_code(secret, &form.otp) {
        Ok(true) => {}
        Ok(false) => return Redirect::to(VERIFY_FAILED_PATH).into_response(),
        Err(err) => return server_error(&err),
    }

    if let Err(err) = storage::mark_twofa_passed(&pool, &token_hash).await {
        return server_error(&err);
    }

    let target = intended_path(&headers).unwrap_or_else(|| DASHBOARD_PATH.to_string());
    (
        AppendHeaders([(SET_COOKIE, clear_intended_cookie(state.config()))]),
        Redirect::to(&target),
    )
        .into_response()
}

/// An enabled factor can only be touched by a session that has already
/// passed the challenge; otherwise a stolen password alone could strip it.
fn challenge_pending(account: &AccountRecord, twofa_passed: bool) -> bool {
    TwoFactorState::from_record(account.totp_secret.as_deref(), account.totp_confirmed)
        == TwoFactorState::Enabled
        && !twofa_passed
}

/// Drop the second factor entirely.
pub async fn disable(
    Extension(pool): Extension<PgPool>,
    Extension(current): Extension<CurrentUser>,
) -> Response {
    let (account, _) = match require_account(&current) {
        Ok(account) => account,
        Err(response) => return response,
    };

    let passed = current
        .0
        .as_ref()
        .is_some_and(|session| session.twofa_passed);
    if challenge_pending(&account, passed) {
        return Redirect::to(VERIFY_PATH).into_response();
    }

    if let Err(err) = storage::clear_totp(&pool, account.id).await {
        return server_error(&err);
    }

    Redirect::to(DASHBOARD_PATH).into_response()
}
