use crate::api;
use crate::api::handlers::auth::AuthConfig;
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            let auth_config = AuthConfig::new(globals.frontend_url.clone())
                .with_token_secret(globals.token_secret.clone())
                .with_totp_issuer(globals.totp_issuer.clone());

            api::new(port, dsn, auth_config).await?;
        }
    }

    Ok(())
}
