use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub redemption: RedemptionConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

/// Ticket backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL of the verification API (e.g., "http://localhost:3000/api/v1")
    pub base_url: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    10
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Operator login name (required when method = "credentials")
    #[serde(default)]
    pub username: Option<String>,
    /// Operator password (required when method = "credentials")
    #[serde(default)]
    pub password: Option<String>,
    /// Operator id reported with redemptions (defaults to username)
    #[serde(default)]
    pub operator_id: Option<String>,
    /// Pre-issued bearer token (required when method = "token")
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Operator username/password checked at startup
    Credentials,
    /// Bearer token issued out of band
    Token,
}

/// Redemption workflow configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedemptionConfig {
    /// Location tag sent with every redemption
    #[serde(default = "default_location")]
    pub location: String,
    /// Note sent with every redemption
    #[serde(default = "default_note")]
    pub note: String,
    /// Delay before the scanner resumes after a failed scan or lookup (milliseconds)
    #[serde(default = "default_error_resume_delay")]
    pub error_resume_delay_ms: u64,
    /// Delay before the scanner resumes after a successful redemption (milliseconds)
    #[serde(default = "default_success_resume_delay")]
    pub success_resume_delay_ms: u64,
    /// Capacity of the workflow event channel
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_location() -> String {
    "Main entrance".to_string()
}

fn default_note() -> String {
    "Regular check-in".to_string()
}

fn default_error_resume_delay() -> u64 {
    2000
}

fn default_success_resume_delay() -> u64 {
    3000
}

fn default_event_buffer() -> usize {
    64
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
            note: default_note(),
            error_resume_delay_ms: default_error_resume_delay(),
            success_resume_delay_ms: default_success_resume_delay(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Statistics polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    /// Restrict statistics to a single concert
    #[serde(default)]
    pub concert_id: Option<String>,
    /// Refresh interval in seconds (default: 30)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval() -> u64 {
    30
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            concert_id: None,
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub backend: BackendConfig,
    pub auth: SanitizedAuthConfig,
    pub redemption: RedemptionConfig,
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password_configured: bool,
    pub token_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            backend: config.backend.clone(),
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::Credentials => "credentials".to_string(),
                    AuthMethod::Token => "token".to_string(),
                },
                username: config.auth.username.clone(),
                password_configured: config
                    .auth
                    .password
                    .as_deref()
                    .is_some_and(|p| !p.is_empty()),
                token_configured: config.auth.token.as_deref().is_some_and(|t| !t.is_empty()),
            },
            redemption: config.redemption.clone(),
            stats: config.stats.clone(),
        }
    }
}
