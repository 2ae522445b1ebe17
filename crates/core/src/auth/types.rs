use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::{AuthError, Authenticator};

/// Operator login credentials.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Token handed out by an authenticator.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub operator_id: String,
}

/// Authentication state for one operator.
///
/// Passed explicitly into the backend client instead of living in ambient
/// storage. The client holds it behind a [`SharedAuthSession`] so an
/// unauthorized response can invalidate it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthSession {
    #[serde(skip)]
    token: Option<String>,
    operator_id: Option<String>,
    logged_in_at: Option<DateTime<Utc>>,
}

/// Auth session shared between the backend client and its owner.
pub type SharedAuthSession = Arc<RwLock<AuthSession>>;

impl AuthSession {
    /// Create a logged-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log in through the given authenticator, replacing any previous token.
    ///
    /// On failure the session is left logged out.
    pub async fn login(
        &mut self,
        authenticator: &dyn Authenticator,
        credentials: &Credentials,
    ) -> Result<(), AuthError> {
        self.logout();
        let issued = authenticator.authenticate(credentials).await?;
        self.restore(issued.token, issued.operator_id);
        Ok(())
    }

    /// Adopt a token issued out of band.
    pub fn restore(&mut self, token: impl Into<String>, operator_id: impl Into<String>) {
        self.token = Some(token.into());
        self.operator_id = Some(operator_id.into());
        self.logged_in_at = Some(Utc::now());
    }

    /// Drop the token. Idempotent.
    pub fn logout(&mut self) {
        self.token = None;
        self.operator_id = None;
        self.logged_in_at = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn operator_id(&self) -> Option<&str> {
        self.operator_id.as_deref()
    }

    pub fn logged_in_at(&self) -> Option<DateTime<Utc>> {
        self.logged_in_at
    }

    /// Wrap into a shareable handle.
    pub fn into_shared(self) -> SharedAuthSession {
        Arc::new(RwLock::new(self))
    }
}
