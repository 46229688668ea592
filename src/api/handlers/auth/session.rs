//! Browser login, logout and the authenticated landing page.
//!
//! One login form serves all three principal kinds. Lookup walks the login
//! order and stops at the first kind holding the email, so a password
//! mismatch there never falls through to a later kind.

use axum::{
    extract::{Extension, OriginalUri},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Json, Redirect, Response},
    Form,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use super::guard::{
    clear_intended_cookie, clear_session_cookie, cookie_value, intended_path, session_cookie,
    stash_intended_cookie,
};
use super::principal::{CurrentUser, Guard, Principal};
use super::state::AuthState;
use super::storage::{self, LoginRecord};
use super::utils::{hash_session_token, normalize_email, verify_password};
use crate::totp::TwoFactorState;
use uuid::Uuid;

const LOGIN_PATH: &str = "/login";
const LOGIN_FAILED_PATH: &str = "/login?error=invalid_credentials";
const VERIFY_PATH: &str = "/2fa/verify";
const DASHBOARD_PATH: &str = "/dashboard";

fn server_error(err: &anyhow::Error) -> Response {
    tracing::error!("session handler failed: {err:#}");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

/// Credential lookup per principal kind, behind a seam so the precedence
/// loop can be exercised without Postgres.
pub(super) trait CredentialSource {
    async fn credentials(
        &self,
        guard: Guard,
        email: &str,
    ) -> anyhow::Result<Option<LoginRecord>>;
}

impl CredentialSource for PgPool {
    async fn credentials(
        &self,
        guard: Guard,
        email: &str,
    ) -> anyhow::Result<Option<LoginRecord>> {
        storage::credentials(self, guard, email).await
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum LoginOutcome {
    Matched { guard: Guard, principal_id: Uuid },
    Rejected,
}

/// Walk the login order and stop at the first kind holding the email. A
/// wrong password there rejects the attempt outright; it never falls through
/// to a later kind. Unknown email and wrong password produce the same
/// outcome.
pub(super) async fn resolve_credentials<S: CredentialSource>(
    source: &S,
    email: &str,
    password: &str,
) -> anyhow::Result<LoginOutcome> {
    for guard in Guard::LOGIN_ORDER {
        let Some(record) = source.credentials(guard, email).await? else {
            continue;
        };

        if verify_password(password, &record.password_hash) {
            return Ok(LoginOutcome::Matched {
                guard,
                principal_id: record.id,
            });
        }
        return Ok(LoginOutcome::Rejected);
    }

    Ok(LoginOutcome::Rejected)
}

/// POST /login
pub async fn login(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Form(form): Form<super::types::LoginForm>,
) -> Response {
    let email = normalize_email(&form.email);
    if email.is_empty() || form.password.is_empty() {
        return Redirect::to(LOGIN_FAILED_PATH).into_response();
    }

    let outcome = match resolve_credentials(&pool, &email, &form.password).await {
        Ok(outcome) => outcome,
        Err(err) => return server_error(&err),
    };
    let LoginOutcome::Matched {
        guard,
        principal_id,
    } = outcome
    else {
        // Unknown email reports the same generic outcome as a wrong password.
        return Redirect::to(LOGIN_FAILED_PATH).into_response();
    };

    let config = state.config();
    let token = match storage::insert_session(
        &pool,
        guard,
        principal_id,
        config.session_ttl_seconds(),
    )
    .await
    {
        Ok(token) => token,
        Err(err) => return server_error(&err),
    };

    let target = intended_path(&headers).unwrap_or_else(|| DASHBOARD_PATH.to_string());
    (
        AppendHeaders([
            (SET_COOKIE, session_cookie(config, guard, &token)),
            (SET_COOKIE, clear_intended_cookie(config)),
        ]),
        Redirect::to(&target),
    )
        .into_response()
}

/// POST /logout
///
/// Deletes the session row behind every presented guard cookie and expires
/// all of them, so a browser holding sessions under two guards logs out of
/// both at once.
pub async fn logout(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Response {
    let config = state.config();

    for guard in Guard::RESOLUTION_ORDER {
        let Some(token) = cookie_value(&headers, guard.cookie_name()) else {
            continue;
        };
        if let Err(err) = storage::delete_session(&pool, &hash_session_token(&token)).await {
            return server_error(&err);
        }
    }

    (
        AppendHeaders([
            (SET_COOKIE, clear_session_cookie(config, Guard::Patient)),
            (SET_COOKIE, clear_session_cookie(config, Guard::Staff)),
            (SET_COOKIE, clear_session_cookie(config, Guard::Web)),
            (SET_COOKIE, clear_intended_cookie(config)),
        ]),
        Redirect::to(LOGIN_PATH),
    )
        .into_response()
}

/// GET /dashboard
///
/// The landing page behind authentication. Unauthenticated requests stash
/// the attempted URL and go to login; accounts with an enabled second factor
/// that have not passed the challenge this session go to the verify page.
pub async fn dashboard(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(current): Extension<CurrentUser>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let config = state.config();

    let Some(session) = current.0 else {
        return (
            AppendHeaders([(SET_COOKIE, stash_intended_cookie(config, uri.path()))]),
            Redirect::to(LOGIN_PATH),
        )
            .into_response();
    };

    if let Principal::Account(account) = &session.principal {
        let factor =
            TwoFactorState::from_record(account.totp_secret.as_deref(), account.totp_confirmed);
        if factor == TwoFactorState::Enabled && !session.twofa_passed {
            return (
                AppendHeaders([(SET_COOKIE, stash_intended_cookie(config, uri.path()))]),
                Redirect::to(VERIFY_PATH),
            )
                .into_response();
        }
    }

    Json(json!({
        "message": "Welcome back",
        "guard": session.guard.as_str(),
        "email": session.principal.email(),
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::principal::{AccountRecord, AccountRole, ActiveSession};
    use crate::api::handlers::auth::rate_limit::NoopRateLimiter;
    use crate::api::handlers::auth::state::AuthConfig;
    use crate::api::handlers::auth::utils::hash_password;
    use axum::http::header::LOCATION;
    use axum::http::Uri;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[derive(Default)]
    struct InMemoryCredentials {
        accounts: HashMap<String, LoginRecord>,
        patients: HashMap<String, LoginRecord>,
        staff: HashMap<String, LoginRecord>,
    }

    impl InMemoryCredentials {
        fn insert(&mut self, guard: Guard, email: &str, password: &str) -> Uuid {
            let id = Uuid::new_v4();
            let record = LoginRecord {
                id,
                password_hash: hash_password(password),
            };
            let table = match guard {
                Guard::Web => &mut self.accounts,
                Guard::Patient => &mut self.patients,
                Guard::Staff => &mut self.staff,
            };
            table.insert(email.to_string(), record);
            id
        }
    }

    impl CredentialSource for InMemoryCredentials {
        async fn credentials(
            &self,
            guard: Guard,
            email: &str,
        ) -> anyhow::Result<Option<LoginRecord>> {
            let table = match guard {
                Guard::Web => &self.accounts,
                Guard::Patient => &self.patients,
                Guard::Staff => &self.staff,
            };
            Ok(table.get(email).map(|record| LoginRecord {
                id: record.id,
                password_hash: record.password_hash.clone(),
            }))
        }
    }

    #[tokio::test]
    async fn login_tags_outcome_with_matched_kind() -> anyhow::Result<()> {
        let mut store = InMemoryCredentials::default();
        let staff_id = store.insert(Guard::Staff, "nurse@clinic.test", "ward-pass");

        let outcome = resolve_credentials(&store, "nurse@clinic.test", "ward-pass").await?;
        assert_eq!(
            outcome,
            LoginOutcome::Matched {
                guard: Guard::Staff,
                principal_id: staff_id,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_resolves_to_account_first() -> anyhow::Result<()> {
        let mut store = InMemoryCredentials::default();
        let account_id = store.insert(Guard::Web, "shared@clinic.test", "account-pass");
        store.insert(Guard::Patient, "shared@clinic.test", "patient-pass");

        let outcome = resolve_credentials(&store, "shared@clinic.test", "account-pass").await?;
        assert_eq!(
            outcome,
            LoginOutcome::Matched {
                guard: Guard::Web,
                principal_id: account_id,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_at_first_kind_never_falls_through() -> anyhow::Result<()> {
        let mut store = InMemoryCredentials::default();
        store.insert(Guard::Web, "shared@clinic.test", "account-pass");
        store.insert(Guard::Patient, "shared@clinic.test", "patient-pass");

        // The patient's password is valid for the patient row, but the
        // account owns the email; the attempt must not reach the patient.
        let outcome = resolve_credentials(&store, "shared@clinic.test", "patient-pass").await?;
        assert_eq!(outcome, LoginOutcome::Rejected);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() -> anyhow::Result<()> {
        let mut store = InMemoryCredentials::default();
        store.insert(Guard::Web, "admin@clinic.test", "account-pass");

        let unknown = resolve_credentials(&store, "ghost@clinic.test", "whatever").await?;
        let wrong = resolve_credentials(&store, "admin@clinic.test", "whatever").await?;
        assert_eq!(unknown, LoginOutcome::Rejected);
        assert_eq!(wrong, LoginOutcome::Rejected);
        Ok(())
    }

    fn state() -> Arc<AuthState> {
        Arc::new(AuthState::new(
            AuthConfig::new("http://localhost:3000".to_string()),
            Arc::new(NoopRateLimiter),
        ))
    }

    fn account_session(totp_secret: Option<&str>, confirmed: bool, passed: bool) -> CurrentUser {
        CurrentUser(Some(ActiveSession {
            principal: Principal::Account(AccountRecord {
                id: Uuid::nil(),
                email: "admin@clinic.test".to_string(),
                role: AccountRole::Admin,
                totp_secret: totp_secret.map(str::to_string),
                totp_confirmed: confirmed,
            }),
            guard: Guard::Web,
            token_hash: vec![],
            twofa_passed: passed,
        }))
    }

    fn location(response: &Response) -> Option<String> {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn dashboard_redirects_unauthenticated_to_login() {
        let uri: Uri = "/dashboard".parse().expect("uri");
        let response = dashboard(
            Extension(state()),
            Extension(CurrentUser::default()),
            OriginalUri(uri),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/login".to_string()));
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_default();
        assert!(cookie.starts_with("medgate_intended=/dashboard; "));
    }

    #[tokio::test]
    async fn dashboard_challenges_enabled_second_factor() {
        let uri: Uri = "/dashboard".parse().expect("uri");
        let response = dashboard(
            Extension(state()),
            Extension(account_session(Some("SECRET"), true, false)),
            OriginalUri(uri),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/2fa/verify".to_string()));
    }

    #[tokio::test]
    async fn dashboard_serves_passed_second_factor() {
        let uri: Uri = "/dashboard".parse().expect("uri");
        let response = dashboard(
            Extension(state()),
            Extension(account_session(Some("SECRET"), true, true)),
            OriginalUri(uri),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn dashboard_skips_challenge_for_pending_enrollment() {
        let uri: Uri = "/dashboard".parse().expect("uri");
        // A secret without confirmation never gates login.
        let response = dashboard(
            Extension(state()),
            Extension(account_session(Some("SECRET"), false, false)),
            OriginalUri(uri),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
    }
}
