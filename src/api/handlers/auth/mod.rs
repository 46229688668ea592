//! Authentication and authorization: guards, sessions, second factor,
//! bearer tokens, the capability gate, and the API error envelope.

pub mod envelope;
pub mod gate;
pub mod guard;
pub mod principal;
pub mod rate_limit;
pub mod session;
pub mod state;
pub(crate) mod storage;
pub mod token;
pub mod totp;
pub mod types;
pub(crate) mod utils;

pub use envelope::{ApiFailure, ApiSuccess, ErrorCode};
pub use state::{AuthConfig, AuthState};
