//! Bearer token signing and verification for the API surface.
//!
//! Tokens are stateless HS256 JWTs carrying the account id as subject. The
//! verifier reports a tagged error kind so the boundary can collapse every
//! failure mode into one public error code without losing the detail in logs.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Issuer claim stamped on every token this service mints.
pub const TOKEN_ISSUER: &str = "medgate";

/// Default bearer token lifetime.
pub const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BearerClaims {
    /// Subject (account id)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

impl BearerClaims {
    /// Parse the subject claim as an account id.
    ///
    /// # Errors
    /// Returns [`Error::MissingSubject`] when the claim is empty or not a UUID.
    pub fn subject(&self) -> Result<Uuid, Error> {
        Uuid::parse_str(self.sub.trim()).map_err(|_| Error::MissingSubject)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("token expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("missing or invalid subject claim")]
    MissingSubject,
    #[error("malformed token")]
    Malformed,
    #[error("failed to sign token")]
    Signing,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

/// Mint a signed bearer token for the given account.
///
/// # Errors
/// Returns [`Error::Signing`] if encoding fails.
pub fn sign(secret: &[u8], account_id: Uuid, ttl_seconds: i64) -> Result<String, Error> {
    let now = unix_now();
    let claims = BearerClaims {
        sub: account_id.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        exp: now + ttl_seconds,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|_| Error::Signing)
}

/// Verify a bearer token and return its claims.
///
/// Checks signature, expiry, and issuer. The subject claim is validated
/// separately via [`BearerClaims::subject`] so callers can resolve it against
/// the account store.
///
/// # Errors
/// Returns a tagged [`Error`] describing which check failed. Callers facing
/// API clients must collapse all variants into one public error code.
pub fn verify(secret: &[u8], token: &str) -> Result<BearerClaims, Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    // No grace period: a token past `exp` is invalid immediately.
    validation.leeway = 0;
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let data = decode::<BearerClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => Error::Expired,
            ErrorKind::InvalidSignature => Error::InvalidSignature,
            _ => Error::Malformed,
        })?;

    Ok(data.claims)
}
