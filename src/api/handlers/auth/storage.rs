//! Postgres queries for principals, sessions, second factors and emergency
//! calls.
//!
//! Session tokens are stored hashed; the raw value only ever lives in the
//! client cookie.

use anyhow::{anyhow, Context, Result};
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::principal::{
    AccountRecord, AccountRole, Guard, PatientRecord, Principal, StaffRecord,
};
use super::utils::{generate_session_token, hash_session_token, is_unique_violation};

const SESSION_INSERT_ATTEMPTS: u8 = 3;

/// Credential row used during password verification, identical in shape for
/// all three principal kinds.
#[derive(Debug)]
pub(super) struct LoginRecord {
    pub id: Uuid,
    pub password_hash: String,
}

/// A live session row matched by token hash.
#[derive(Debug)]
pub(super) struct SessionRow {
    pub guard: Guard,
    pub principal_id: Uuid,
    pub twofa_passed: bool,
}

fn credentials_query(guard: Guard) -> &'static str {
    match guard {
        Guard::Web => "SELECT id, password_hash FROM accounts WHERE email = $1",
        Guard::Patient => "SELECT id, password_hash FROM patients WHERE email = $1",
        Guard::Staff => "SELECT id, password_hash FROM staff WHERE email = $1",
    }
}

/// Look up login credentials for `email` under one guard.
pub(super) async fn credentials(
    pool: &PgPool,
    guard: Guard,
    email: &str,
) -> Result<Option<LoginRecord>> {
    let query = credentials_query(guard);
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
        auth.guard = guard.as_str(),
    );

    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to query login credentials")?;

    row.map(|row| -> Result<LoginRecord, sqlx::Error> {
        Ok(LoginRecord {
            id: row.try_get("id")?,
            password_hash: row.try_get("password_hash")?,
        })
    })
    .transpose()
    .context("failed to decode login credentials")
}

pub(super) async fn account_by_id(pool: &PgPool, id: Uuid) -> Result<Option<AccountRecord>> {
    let query = "SELECT id, email, role, totp_secret, \
                 totp_confirmed_at IS NOT NULL AS totp_confirmed \
                 FROM accounts WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
    );

    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to query account")?;

    row.map(|row| {
        let role: String = row.try_get("role")?;
        let role = AccountRole::from_str(&role)
            .ok_or_else(|| anyhow!("unknown account role: {role}"))?;
        Ok(AccountRecord {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            role,
            totp_secret: row.try_get("totp_secret")?,
            totp_confirmed: row.try_get("totp_confirmed")?,
        })
    })
    .transpose()
}

/// Load the full principal behind a session row.
pub(super) async fn load_principal(
    pool: &PgPool,
    guard: Guard,
    id: Uuid,
) -> Result<Option<Principal>> {
    match guard {
        Guard::Web => Ok(account_by_id(pool, id).await?.map(Principal::Account)),
        Guard::Patient => {
            let query = "SELECT id, email FROM patients WHERE id = $1";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.statement = %query,
            );

            let row = sqlx::query(query)
                .bind(id)
                .fetch_optional(pool)
                .instrument(span)
                .await
                .context("failed to query patient")?;

            row.map(|row| -> Result<Principal, sqlx::Error> {
                Ok(Principal::Patient(PatientRecord {
                    id: row.try_get("id")?,
                    email: row.try_get("email")?,
                }))
            })
            .transpose()
            .context("failed to decode patient")
        }
        Guard::Staff => {
            let query = "SELECT staff.id, staff.email, staff_roles.name AS role_name \
                         FROM staff \
                         JOIN staff_roles ON staff_roles.id = staff.role_id \
                         WHERE staff.id = $1";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.statement = %query,
            );

            let row = sqlx::query(query)
                .bind(id)
                .fetch_optional(pool)
                .instrument(span)
                .await
                .context("failed to query staff member")?;

            row.map(|row| -> Result<Principal, sqlx::Error> {
                Ok(Principal::Staff(StaffRecord {
                    id: row.try_get("id")?,
                    email: row.try_get("email")?,
                    role_name: row.try_get("role_name")?,
                }))
            })
            .transpose()
            .context("failed to decode staff member")
        }
    }
}

/// Create a session row and return the raw token for the cookie.
///
/// Retries on a token-hash collision, which in practice never happens with
/// 256-bit tokens but costs nothing to handle.
pub(super) async fn insert_session(
    pool: &PgPool,
    guard: Guard,
    principal_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    let query = "INSERT INTO sessions (token_hash, guard, principal_id, twofa_passed, expires_at) \
                 VALUES ($1, $2, $3, false, NOW() + make_interval(secs => $4))";

    for attempt in 1..=SESSION_INSERT_ATTEMPTS {
        let token = generate_session_token()?;
        let token_hash = hash_session_token(&token);

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.statement = %query,
            auth.guard = guard.as_str(),
        );

        match sqlx::query(query)
            .bind(&token_hash)
            .bind(guard.as_str())
            .bind(principal_id)
            .bind(ttl_seconds as f64)
            .execute(pool)
            .instrument(span)
            .await
        {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) && attempt < SESSION_INSERT_ATTEMPTS => {
                tracing::warn!(attempt, "session token collision, retrying");
            }
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to insert session after retries"))
}

/// Find the live session behind a token hash. Expired rows never match.
pub(super) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRow>> {
    let query = "SELECT guard, principal_id, twofa_passed FROM sessions \
                 WHERE token_hash = $1 AND expires_at > NOW()";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
    );

    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to query session")?;

    row.map(|row| {
        let guard: String = row.try_get("guard")?;
        let guard =
            Guard::from_str(&guard).ok_or_else(|| anyhow!("unknown session guard: {guard}"))?;
        Ok(SessionRow {
            guard,
            principal_id: row.try_get("principal_id")?,
            twofa_passed: row.try_get("twofa_passed")?,
        })
    })
    .transpose()
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM sessions WHERE token_hash = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
    );

    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;

    Ok(())
}

/// Record a passed second-factor challenge on the current session only.
pub(super) async fn mark_twofa_passed(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "UPDATE sessions SET twofa_passed = true WHERE token_hash = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
    );

    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark session second factor")?;

    Ok(())
}

/// Store a fresh pending secret, replacing any previous enrollment.
pub(super) async fn store_totp_secret(pool: &PgPool, account_id: Uuid, secret: &str) -> Result<()> {
    let query = "UPDATE accounts SET totp_secret = $2, totp_confirmed_at = NULL WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
    );

    sqlx::query(query)
        .bind(account_id)
        .bind(secret)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to store second-factor secret")?;

    Ok(())
}

/// Flip a pending enrollment to confirmed. Returns false when no pending
/// secret exists.
pub(super) async fn confirm_totp(pool: &PgPool, account_id: Uuid) -> Result<bool> {
    let query = "UPDATE accounts SET totp_confirmed_at = NOW() \
                 WHERE id = $1 AND totp_secret IS NOT NULL";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
    );

    let result = sqlx::query(query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to confirm second factor")?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn clear_totp(pool: &PgPool, account_id: Uuid) -> Result<()> {
    let query =
        "UPDATE accounts SET totp_secret = NULL, totp_confirmed_at = NULL WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
    );

    sqlx::query(query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to clear second factor")?;

    Ok(())
}

/// Update the role attribute of an account. Returns false when the account
/// does not exist.
pub(crate) async fn update_account_role(
    pool: &PgPool,
    account_id: Uuid,
    role: AccountRole,
) -> Result<bool> {
    let query = "UPDATE accounts SET role = $2 WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
    );

    let result = sqlx::query(query)
        .bind(account_id)
        .bind(role.as_str())
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update account role")?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn insert_emergency_call(
    pool: &PgPool,
    account_id: Uuid,
    location: &str,
    description: &str,
) -> Result<Uuid> {
    let id = Uuid::now_v7();
    let query = "INSERT INTO emergency_calls (id, account_id, location, description, created_at) \
                 VALUES ($1, $2, $3, $4, NOW())";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.statement = %query,
    );

    sqlx::query(query)
        .bind(id)
        .bind(account_id)
        .bind(location)
        .bind(description)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert emergency call")?;

    Ok(id)
}
