//! HTTP client for the ticket verification API.
//!
//! Lookup and stats responses are wrapped in a `{ status, message, data }`
//! envelope; the redemption endpoint answers with a bare outcome.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::SharedAuthSession;
use crate::config::BackendConfig;
use crate::ticket::{RedeemOutcome, RedeemRequest, Ticket, VerificationStats};

use super::{BackendError, TicketBackend};

/// Response envelope used by the lookup and stats endpoints.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    status: EnvelopeStatus,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum EnvelopeStatus {
    Success,
    Error,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Ticket backend over HTTP.
pub struct HttpTicketBackend {
    client: Client,
    base_url: String,
    session: SharedAuthSession,
}

impl HttpTicketBackend {
    /// Create a new client. The auth session is shared so that a 401 can log
    /// the operator out.
    pub fn new(config: &BackendConfig, session: SharedAuthSession) -> Result<Self, BackendError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BackendError::NotConfigured(
                "backend base URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.read().await.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map non-success statuses to faults. A 401 invalidates the session.
    async fn check_status(
        &self,
        response: Response,
        fallback: &str,
    ) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("Backend rejected credentials, logging out");
            self.session.write().await.logout();
            return Err(BackendError::Unauthorized);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(status = status.as_u16(), "Failed to read error body: {}", e);
                String::new()
            }
        };
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string());

        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_envelope<T: DeserializeOwned>(
        &self,
        response: Response,
        fallback: &str,
    ) -> Result<T, BackendError> {
        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(format!("{}: {}", fallback, e)))?;

        if envelope.status == EnvelopeStatus::Success {
            if let Some(data) = envelope.data {
                return Ok(data);
            }
        }

        let message = if envelope.message.is_empty() {
            fallback.to_string()
        } else {
            envelope.message
        };
        Err(BackendError::Rejected(message))
    }
}

#[async_trait]
impl TicketBackend for HttpTicketBackend {
    async fn lookup(&self, code: &str) -> Result<Ticket, BackendError> {
        let url = format!(
            "{}/ticket-verification/info/{}",
            self.base_url,
            urlencoding::encode(code)
        );

        debug!("Ticket lookup: url={}", url);

        let request = self.authorize(self.client.get(&url)).await;
        let response = request.send().await?;
        let response = self
            .check_status(response, "Failed to fetch ticket information")
            .await?;

        self.read_envelope(response, "Failed to fetch ticket information")
            .await
    }

    async fn redeem(&self, request: &RedeemRequest) -> Result<RedeemOutcome, BackendError> {
        let url = format!("{}/ticket-verification/verify", self.base_url);

        debug!("Ticket redeem: ticket_id={}", request.ticket_id);

        let builder = self.authorize(self.client.post(&url).json(request)).await;
        let response = builder.send().await?;
        let response = self
            .check_status(response, "Redemption failed, please try again later")
            .await?;

        response.json().await.map_err(|e| {
            BackendError::ParseError(format!("Failed to parse redemption response: {}", e))
        })
    }

    async fn stats(&self, concert_id: Option<&str>) -> Result<VerificationStats, BackendError> {
        let url = format!("{}/ticket-verification/stats", self.base_url);

        debug!("Verification stats: concert_id={:?}", concert_id);

        let mut builder = self.client.get(&url);
        if let Some(id) = concert_id {
            builder = builder.query(&[("concertId", id)]);
        }
        let builder = self.authorize(builder).await;

        let response = builder.send().await?;
        let response = self
            .check_status(response, "Failed to fetch statistics")
            .await?;

        self.read_envelope(response, "Failed to fetch statistics")
            .await
    }
}
