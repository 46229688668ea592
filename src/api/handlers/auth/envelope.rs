//! API error envelope: fixed numeric codes, canonical messages and statuses.
//!
//! Every failure on the token-authenticated surface is one of these codes.
//! The code-to-status table is closed; anything presenting an unmapped code
//! falls back to 400 so a bad mapping can never turn into a 200.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    LoginFailed,
    TokenNotProvided,
    InvalidOrExpiredToken,
    Forbidden,
    PasswordResetTokenInvalid,
    PasswordResetLinkSendFailed,
    ValidationFailed,
    ResourceNotFound,
    VisitSlotUnavailable,
    TooManyRequests,
    ServerError,
    ServiceUnavailable,
}

impl ErrorCode {
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::LoginFailed => 10001,
            Self::TokenNotProvided => 10002,
            Self::InvalidOrExpiredToken => 10003,
            Self::Forbidden => 10004,
            Self::PasswordResetTokenInvalid => 10005,
            Self::PasswordResetLinkSendFailed => 10006,
            Self::ValidationFailed => 11001,
            Self::ResourceNotFound => 12001,
            Self::VisitSlotUnavailable => 13001,
            Self::TooManyRequests => 15001,
            Self::ServerError => 16001,
            Self::ServiceUnavailable => 16002,
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::LoginFailed => "Invalid credentials",
            Self::TokenNotProvided => "Token not provided",
            Self::InvalidOrExpiredToken => "Invalid or expired token",
            Self::Forbidden => "Forbidden",
            Self::PasswordResetTokenInvalid => "Invalid password reset token",
            Self::PasswordResetLinkSendFailed => "Failed to send password reset link",
            Self::ValidationFailed => "The given data was invalid",
            Self::ResourceNotFound => "Resource not found",
            Self::VisitSlotUnavailable => "The requested visit slot is unavailable",
            Self::TooManyRequests => "Too many requests",
            Self::ServerError => "Internal server error",
            Self::ServiceUnavailable => "Service unavailable",
        }
    }

    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::LoginFailed | Self::TokenNotProvided | Self::InvalidOrExpiredToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::PasswordResetTokenInvalid => StatusCode::BAD_REQUEST,
            Self::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ResourceNotFound => StatusCode::NOT_FOUND,
            Self::VisitSlotUnavailable => StatusCode::CONFLICT,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::PasswordResetLinkSendFailed | Self::ServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        [
            Self::LoginFailed,
            Self::TokenNotProvided,
            Self::InvalidOrExpiredToken,
            Self::Forbidden,
            Self::PasswordResetTokenInvalid,
            Self::PasswordResetLinkSendFailed,
            Self::ValidationFailed,
            Self::ResourceNotFound,
            Self::VisitSlotUnavailable,
            Self::TooManyRequests,
            Self::ServerError,
            Self::ServiceUnavailable,
        ]
        .into_iter()
        .find(|candidate| candidate.code() == code)
    }
}

/// HTTP status for a raw numeric code. Unknown codes map to 400.
#[must_use]
pub fn status_for_code(code: u32) -> StatusCode {
    ErrorCode::from_code(code).map_or(StatusCode::BAD_REQUEST, ErrorCode::status)
}

/// A failed API response: `{success: false, code, error}` or, for validation
/// failures, `{success: false, code, errors, message}`.
#[derive(Debug)]
pub struct ApiFailure {
    code: ErrorCode,
    errors: Option<BTreeMap<String, String>>,
}

impl ApiFailure {
    #[must_use]
    pub fn new(code: ErrorCode) -> Self {
        Self { code, errors: None }
    }

    #[must_use]
    pub fn validation(errors: BTreeMap<String, String>) -> Self {
        Self {
            code: ErrorCode::ValidationFailed,
            errors: Some(errors),
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = self.code.status();
        let body = match self.errors {
            Some(errors) => json!({
                "success": false,
                "code": self.code.code(),
                "errors": errors,
                "message": self.code.message(),
            }),
            None => json!({
                "success": false,
                "code": self.code.code(),
                "error": self.code.message(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

/// A successful API response: `{success: true, message, data?}`.
#[derive(Debug)]
pub struct ApiSuccess {
    message: String,
    data: Option<serde_json::Value>,
}

impl ApiSuccess {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl IntoResponse for ApiSuccess {
    fn into_response(self) -> Response {
        let body = match self.data {
            Some(data) => json!({
                "success": true,
                "message": self.message,
                "data": data,
            }),
            None => json!({
                "success": true,
                "message": self.message,
            }),
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}
