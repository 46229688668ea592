//! Auth state and configuration shared across handlers.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use super::rate_limit::RateLimiter;
use crate::token::DEFAULT_TOKEN_TTL_SECONDS;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_TOTP_ISSUER: &str = "Medgate";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    token_ttl_seconds: i64,
    token_secret: SecretString,
    totp_issuer: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            token_secret: SecretString::from(String::new()),
            totp_issuer: DEFAULT_TOTP_ISSUER.to_string(),
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_secret(mut self, secret: SecretString) -> Self {
        self.token_secret = secret;
        self
    }

    #[must_use]
    pub fn with_totp_issuer(mut self, issuer: String) -> Self {
        self.totp_issuer = issuer;
        self
    }

    #[must_use]
    pub fn totp_issuer(&self) -> &str {
        &self.totp_issuer
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(crate) fn token_secret_bytes(&self) -> &[u8] {
        self.token_secret.expose_secret().as_bytes()
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            config,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::{AuthConfig, AuthState};
    use secrecy::SecretString;
    use std::sync::Arc;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://clinic.example.com".to_string());

        assert_eq!(config.frontend_base_url(), "https://clinic.example.com");
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert_eq!(
            config.token_ttl_seconds(),
            crate::token::DEFAULT_TOKEN_TTL_SECONDS
        );
        assert_eq!(config.totp_issuer(), super::DEFAULT_TOTP_ISSUER);
        assert!(config.session_cookie_secure());

        let config = config
            .with_session_ttl_seconds(120)
            .with_token_ttl_seconds(60)
            .with_token_secret(SecretString::from("key"))
            .with_totp_issuer("Clinic".to_string());

        assert_eq!(config.session_ttl_seconds(), 120);
        assert_eq!(config.token_ttl_seconds(), 60);
        assert_eq!(config.token_secret_bytes(), b"key");
        assert_eq!(config.totp_issuer(), "Clinic");
    }

    #[test]
    fn plain_http_frontend_means_insecure_cookie() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn auth_state_exposes_config() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        let state = AuthState::new(config, Arc::new(NoopRateLimiter));
        assert_eq!(state.config().frontend_base_url(), "http://localhost:3000");
    }
}
