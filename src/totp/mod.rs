//! TOTP second-factor engine.
//!
//! Pure secret/code handling over `totp-rs`: secret generation, provisioning
//! material for enrollment (otpauth URI plus QR), and code verification.
//! Persistence of the secret and the confirmation timestamp lives with the
//! account store; this module never touches the database.

use anyhow::{anyhow, Result};
use totp_rs::{Algorithm, Secret, TOTP};

/// 6-digit codes, 30 second step, one step of drift either way.
const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP: u64 = 30;

/// Enrollment lifecycle for one account.
///
/// The secret column and the confirmation timestamp together encode the
/// state: no secret means not enrolled, a secret without confirmation is
/// pending, and a confirmed secret is enabled. Disable clears both.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TwoFactorState {
    NotEnrolled,
    PendingConfirmation,
    Enabled,
}

impl TwoFactorState {
    #[must_use]
    pub fn from_record(secret: Option<&str>, confirmed: bool) -> Self {
        match (secret, confirmed) {
            (None, _) => Self::NotEnrolled,
            (Some(_), false) => Self::PendingConfirmation,
            (Some(_), true) => Self::Enabled,
        }
    }
}

/// Material shown once at enrollment: the raw secret for manual entry, the
/// provisioning URI, and the same URI rendered as a QR data URL.
#[derive(Debug)]
pub struct Enrollment {
    pub secret_base32: String,
    pub otpauth_url: String,
    pub qr_png_base64: String,
}

/// Generate a fresh random secret in base32 form.
#[must_use]
pub fn generate_secret() -> String {
    Secret::generate_secret().to_encoded().to_string()
}

fn build_totp(secret_base32: &str, issuer: &str, account_email: &str) -> Result<TOTP> {
    let secret_bytes = Secret::Encoded(secret_base32.to_string())
        .to_bytes()
        .map_err(|err| anyhow!("invalid TOTP secret: {err:?}"))?;

    TOTP::new(
        Algorithm::SHA1,
        DIGITS,
        SKEW,
        STEP,
        secret_bytes,
        Some(issuer.to_string()),
        account_email.to_string(),
    )
    .map_err(|err| anyhow!("TOTP init error: {err}"))
}

/// Build the material presented to the user when enrollment (re)starts.
///
/// # Errors
/// Returns an error if the secret does not decode or QR rendering fails.
pub fn enrollment_material(
    secret_base32: &str,
    issuer: &str,
    account_email: &str,
) -> Result<Enrollment> {
    let totp = build_totp(secret_base32, issuer, account_email)?;

    let qr = totp
        .get_qr_base64()
        .map_err(|err| anyhow!("QR gen error: {err}"))?;

    Ok(Enrollment {
        secret_base32: totp.get_secret_base32(),
        otpauth_url: totp.get_url(),
        qr_png_base64: format!("data:image/png;base64,{qr}"),
    })
}

/// Cheap format gate applied before any cryptographic check.
#[must_use]
pub fn valid_code_format(code: &str) -> bool {
    code.len() == DIGITS && code.bytes().all(|byte| byte.is_ascii_digit())
}

/// Verify a code against a stored secret at the current time step.
///
/// Codes failing the format gate are rejected without touching the clock.
///
/// # Errors
/// Returns an error if the secret does not decode or the system clock is
/// unreadable; a wrong-but-well-formed code is `Ok(false)`.
pub fn check_code(secret_base32: &str, code: &str) -> Result<bool> {
    if !valid_code_format(code) {
        return Ok(false);
    }

    let totp = build_totp(secret_base32, "check", "check")?;
    totp.check_current(code)
        .map_err(|err| anyhow!("system clock error: {err}"))
}

/// Generate the code for the current time step. Test helper for enrollment
/// confirmation flows; never exposed over HTTP.
#[cfg(test)]
pub fn current_code(secret_base32: &str) -> Result<String> {
    let totp = build_totp(secret_base32, "check", "check")?;
    totp.generate_current()
        .map_err(|err| anyhow!("system clock error: {err}"))
}
