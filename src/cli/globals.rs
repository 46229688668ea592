use secrecy::SecretString;

/// Settings shared across the server beyond the listening socket: the bearer
/// token signing key and the knobs the auth handlers need.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub token_secret: SecretString,
    pub frontend_url: String,
    pub totp_issuer: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(token_secret: SecretString) -> Self {
        Self {
            token_secret,
            frontend_url: String::new(),
            totp_issuer: String::new(),
        }
    }
}
