//! Operator credential authentication.

use async_trait::async_trait;
use uuid::Uuid;

use super::{AuthError, Authenticator, Credentials, IssuedToken};

/// Authenticator that checks operator credentials against a configured pair.
///
/// Issues an opaque `tickeasy-<uuid>` token on success.
pub struct CredentialsAuthenticator {
    expected: Credentials,
    operator_id: String,
}

impl CredentialsAuthenticator {
    pub fn new(expected: Credentials, operator_id: Option<String>) -> Self {
        let operator_id = operator_id.unwrap_or_else(|| expected.username.clone());
        Self {
            expected,
            operator_id,
        }
    }
}

#[async_trait]
impl Authenticator for CredentialsAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<IssuedToken, AuthError> {
        // Evaluate both comparisons so timing does not reveal which one failed
        let username_ok = constant_time_eq(
            credentials.username.as_bytes(),
            self.expected.username.as_bytes(),
        );
        let password_ok = constant_time_eq(
            credentials.password.as_bytes(),
            self.expected.password.as_bytes(),
        );

        if username_ok & password_ok {
            Ok(IssuedToken {
                token: format!("tickeasy-{}", Uuid::new_v4()),
                operator_id: self.operator_id.clone(),
            })
        } else {
            Err(AuthError::InvalidCredentials(
                "Wrong username or password".to_string(),
            ))
        }
    }

    fn method_name(&self) -> &'static str {
        "credentials"
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
