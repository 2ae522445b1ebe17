mod credentials;
mod traits;
mod types;

pub use credentials::*;
pub use traits::*;
pub use types::*;

use crate::config::{AuthConfig, AuthMethod};

/// Factory function to create an authenticator from config
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::Credentials => {
            let credentials = config_credentials(config)?;
            Ok(Box::new(CredentialsAuthenticator::new(
                credentials,
                config.operator_id.clone(),
            )))
        }
        AuthMethod::Token => Err(AuthError::ConfigurationError(
            "token auth does not use an authenticator".to_string(),
        )),
    }
}

/// Build a logged-in session according to the configured method.
pub async fn establish_session(config: &AuthConfig) -> Result<AuthSession, AuthError> {
    let mut session = AuthSession::new();

    match config.method {
        AuthMethod::Credentials => {
            let authenticator = create_authenticator(config)?;
            let credentials = config_credentials(config)?;
            session.login(authenticator.as_ref(), &credentials).await?;
        }
        AuthMethod::Token => {
            let token = config.token.clone().ok_or_else(|| {
                AuthError::ConfigurationError(
                    "token must be set when using Token auth method".to_string(),
                )
            })?;
            let operator_id = config
                .operator_id
                .clone()
                .unwrap_or_else(|| "operator".to_string());
            session.restore(token, operator_id);
        }
    }

    Ok(session)
}

fn config_credentials(config: &AuthConfig) -> Result<Credentials, AuthError> {
    match (&config.username, &config.password) {
        (Some(username), Some(password)) => Ok(Credentials::new(username, password)),
        _ => Err(AuthError::ConfigurationError(
            "username and password must be set when using Credentials auth method".to_string(),
        )),
    }
}
