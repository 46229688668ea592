//! Request and response payloads for the auth endpoints.

use serde::{Deserialize, Serialize};

/// Browser login form, shared by all three principal kinds.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// JSON login request on the token surface.
#[derive(Debug, Deserialize)]
pub struct ApiLoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Bearer token issued on API login and refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

impl TokenResponse {
    #[must_use]
    pub fn new(token: String, expires_in: i64) -> Self {
        Self {
            token,
            token_type: "bearer",
            expires_in,
        }
    }
}

/// One-time code submitted during enrollment confirmation or the login
/// challenge.
#[derive(Debug, Deserialize)]
pub struct OtpForm {
    pub otp: String,
}

#[derive(Debug, Deserialize)]
pub struct EmergencyCallRequest {
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: Option<String>,
}

/// Enrollment material returned when a second factor is (re)started.
#[derive(Debug, Serialize)]
pub struct TwoFactorSetupResponse {
    pub secret: String,
    pub otpauth_url: String,
    pub qr_code_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_serializes_bearer_type() {
        let response = TokenResponse::new("abc".to_string(), 3600);
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["token"], "abc");
        assert_eq!(value["token_type"], "bearer");
        assert_eq!(value["expires_in"], 3600);
    }

    #[test]
    fn api_login_request_tolerates_missing_fields() {
        let request: ApiLoginRequest = serde_json::from_str("{}").expect("deserialize");
        assert!(request.email.is_none());
        assert!(request.password.is_none());

        let request: ApiLoginRequest =
            serde_json::from_str(r#"{"email":"a@b.co","password":"pw"}"#).expect("deserialize");
        assert_eq!(request.email.as_deref(), Some("a@b.co"));
        assert_eq!(request.password.as_deref(), Some("pw"));
    }

    #[test]
    fn emergency_call_request_tolerates_missing_fields() {
        let request: EmergencyCallRequest = serde_json::from_str("{}").expect("deserialize");
        assert!(request.location.is_none());
        assert!(request.description.is_none());
    }
}
