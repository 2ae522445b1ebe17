//! Ticket verification backend.
//!
//! The workflow only talks to the backend through [`TicketBackend`], so the
//! HTTP client can be swapped for a mock in tests.

mod http;

pub use http::HttpTicketBackend;

use async_trait::async_trait;
use thiserror::Error;

use crate::ticket::{RedeemOutcome, RedeemRequest, Ticket, VerificationStats};

/// Faults reported by the ticket backend.
///
/// Display strings are shown to operators as-is.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport failure (connection refused, timeout, ...).
    #[error("Network error, please try again later: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the bearer token; the auth session was cleared.
    #[error("Session expired, please log in again")]
    Unauthorized,

    /// Non-success HTTP status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The envelope reported `status: "error"`.
    #[error("{0}")]
    Rejected(String),

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Client not configured (bad base URL, ...).
    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

impl BackendError {
    /// HTTP status associated with the fault, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Unauthorized => Some(401),
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Operations of the ticket verification API.
#[async_trait]
pub trait TicketBackend: Send + Sync {
    /// Fetch a ticket by the raw scanned code.
    async fn lookup(&self, code: &str) -> Result<Ticket, BackendError>;

    /// Redeem a ticket. Business rejections come back as
    /// `Ok(RedeemOutcome { success: false, .. })`.
    async fn redeem(&self, request: &RedeemRequest) -> Result<RedeemOutcome, BackendError>;

    /// Aggregate statistics, optionally restricted to one concert.
    async fn stats(&self, concert_id: Option<&str>) -> Result<VerificationStats, BackendError>;
}
