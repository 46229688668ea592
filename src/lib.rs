//! # Medgate (Clinic Auth Core)
//!
//! `medgate` is the authentication and authorization core that sits in front
//! of a clinic back-office. It owns session login across three principal
//! kinds (accounts, patients, staff), stateless bearer-token authentication
//! for the API surface, TOTP second-factor enrollment and verification, and
//! the coarse role gates consulted by the CRUD layer.
//!
//! ## Guards
//!
//! Three guards share one login form. The login flow resolves credentials in
//! a fixed priority order (accounts, patients, staff) and tags the resulting
//! session with the guard that matched. Per request, the guard resolver scans
//! sessions in order (patient, staff, web) and pins the first live one as the
//! active principal.
//!
//! ## Second factor
//!
//! Accounts may enroll a TOTP secret (SHA-1, 6 digits, 30 second step). The
//! confirmation timestamp is the single source of truth for whether 2FA is
//! enabled; the per-session `twofa_passed` flag gates sensitive routes and
//! dies with the session.
//!
//! ## API surface
//!
//! API requests authenticate with an HS256 bearer token resolving to an
//! account. Every API failure is a fixed numeric code with one canonical
//! message and status; token-validation failures are deliberately collapsed
//! into a single code so clients learn nothing about token internals.

pub mod api;
pub mod cli;
pub mod token;
pub mod totp;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
