use async_trait::async_trait;
use thiserror::Error;

use super::types::{Credentials, IssuedToken};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange operator credentials for a bearer token
    async fn authenticate(&self, credentials: &Credentials) -> Result<IssuedToken, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}
