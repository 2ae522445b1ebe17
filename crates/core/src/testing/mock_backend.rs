//! Mock ticket backend for testing.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::backend::{BackendError, TicketBackend};
use crate::ticket::{
    RedeemOutcome, RedeemRequest, RedeemedTicket, Ticket, TicketStatus, VerificationStats,
};

/// A recorded backend call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedBackendCall {
    Lookup { code: String },
    Redeem(RedeemRequest),
    Stats { concert_id: Option<String> },
}

/// Mock implementation of the TicketBackend trait.
///
/// Provides controllable behavior for testing:
/// - Tickets keyed by the raw scanned code
/// - Redemption that marks tickets used, or queued outcomes
/// - Error injection and an artificial response delay
/// - Tracking of concurrently outstanding requests
#[derive(Debug)]
pub struct MockTicketBackend {
    /// Tickets by raw code.
    tickets: Arc<RwLock<HashMap<String, Ticket>>>,
    /// Outcomes returned by the next redeem calls, in order.
    redeem_results: Arc<RwLock<VecDeque<Result<RedeemOutcome, BackendError>>>>,
    stats: Arc<RwLock<Option<VerificationStats>>>,
    /// Recorded calls.
    calls: Arc<RwLock<Vec<RecordedBackendCall>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<BackendError>>>,
    /// Delay applied to every response.
    delay: Arc<RwLock<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockTicketBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTicketBackend {
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(RwLock::new(HashMap::new())),
            redeem_results: Arc::new(RwLock::new(VecDeque::new())),
            stats: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Register the ticket returned for `code`.
    pub async fn add_ticket(&self, code: &str, ticket: Ticket) {
        self.tickets.write().await.insert(code.to_string(), ticket);
    }

    /// Current backend-side copy of the ticket for `code`.
    pub async fn ticket(&self, code: &str) -> Option<Ticket> {
        self.tickets.read().await.get(code).cloned()
    }

    /// Queue the result of a future redeem call. Queued results take
    /// precedence over the default behavior.
    pub async fn push_redeem_result(&self, result: Result<RedeemOutcome, BackendError>) {
        self.redeem_results.write().await.push_back(result);
    }

    pub async fn set_stats(&self, stats: VerificationStats) {
        *self.stats.write().await = Some(stats);
    }

    /// Delay every response by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    // =========================================================================
    // Call Recording
    // =========================================================================

    pub async fn recorded_calls(&self) -> Vec<RecordedBackendCall> {
        self.calls.read().await.clone()
    }

    pub async fn recorded_lookups(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedBackendCall::Lookup { code } => Some(code.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn recorded_redeems(&self) -> Vec<RedeemRequest> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedBackendCall::Redeem(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn recorded_stats_queries(&self) -> Vec<Option<String>> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedBackendCall::Stats { concert_id } => Some(concert_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Get the number of calls performed.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Requests currently being served.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of requests ever served at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Error Injection
    // =========================================================================

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: BackendError) {
        *self.next_error.write().await = Some(error);
    }

    /// Clear any pending error.
    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    async fn take_error(&self) -> Option<BackendError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, call: RecordedBackendCall) {
        self.calls.write().await.push(call);
    }

    /// Count the request as outstanding until the guard drops, then apply
    /// the configured delay. An aborted request still releases its slot.
    async fn begin(&self) -> InFlightGuard {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlightGuard {
            counter: Arc::clone(&self.in_flight),
        };

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        guard
    }

    async fn default_redeem(&self, request: &RedeemRequest) -> Result<RedeemOutcome, BackendError> {
        let mut tickets = self.tickets.write().await;
        let Some(ticket) = tickets
            .get_mut(&request.qr_code)
            .filter(|t| t.ticket_id == request.ticket_id)
        else {
            return Err(not_found());
        };

        match ticket.status {
            TicketStatus::Purchased => {
                let now = Utc::now().to_rfc3339();
                ticket.status = TicketStatus::Used;
                ticket.verified_at = Some(now.clone());
                ticket.verified_by = Some("mock-operator".to_string());
                ticket.verification_location = request.location.clone();
                ticket.note = request.note.clone();

                Ok(RedeemOutcome::accepted("Ticket verified successfully").with_data(
                    RedeemedTicket {
                        ticket_id: Some(ticket.ticket_id.clone()),
                        concert_title: Some(ticket.concert_info.title.clone()),
                        verified_at: Some(now),
                    },
                ))
            }
            TicketStatus::Used => Ok(RedeemOutcome::rejected("Ticket already used")),
            TicketStatus::Refunded => Ok(RedeemOutcome::rejected("Ticket has been refunded")),
        }
    }
}

struct InFlightGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn not_found() -> BackendError {
    BackendError::Api {
        status: 404,
        message: "Ticket not found".to_string(),
    }
}

#[async_trait]
impl TicketBackend for MockTicketBackend {
    async fn lookup(&self, code: &str) -> Result<Ticket, BackendError> {
        self.record(RecordedBackendCall::Lookup {
            code: code.to_string(),
        })
        .await;
        let _guard = self.begin().await;

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.tickets
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn redeem(&self, request: &RedeemRequest) -> Result<RedeemOutcome, BackendError> {
        self.record(RecordedBackendCall::Redeem(request.clone())).await;
        let _guard = self.begin().await;

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        if let Some(result) = self.redeem_results.write().await.pop_front() {
            return result;
        }

        self.default_redeem(request).await
    }

    async fn stats(&self, concert_id: Option<&str>) -> Result<VerificationStats, BackendError> {
        self.record(RecordedBackendCall::Stats {
            concert_id: concert_id.map(str::to_string),
        })
        .await;
        let _guard = self.begin().await;

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.stats
            .read()
            .await
            .clone()
            .ok_or_else(|| BackendError::Rejected("No statistics available".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_lookup_known_and_unknown_codes() {
        let backend = MockTicketBackend::new();
        let code = fixtures::code("u1", "o1");
        backend.add_ticket(&code, fixtures::purchased_ticket("t-1")).await;

        let ticket = backend.lookup(&code).await.unwrap();
        assert_eq!(ticket.ticket_id, "t-1");

        let err = backend.lookup("TICKEASY|x|y").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(backend.recorded_lookups().await.len(), 2);
    }

    #[tokio::test]
    async fn test_default_redeem_marks_ticket_used_once() {
        let backend = MockTicketBackend::new();
        let code = fixtures::code("u1", "o1");
        backend.add_ticket(&code, fixtures::purchased_ticket("t-1")).await;

        let request = RedeemRequest {
            ticket_id: "t-1".to_string(),
            qr_code: code.clone(),
            location: Some("Main entrance".to_string()),
            note: None,
        };

        let first = backend.redeem(&request).await.unwrap();
        assert!(first.success);
        assert_eq!(first.data.unwrap().ticket_id.as_deref(), Some("t-1"));

        let stored = backend.ticket(&code).await.unwrap();
        assert_eq!(stored.status, TicketStatus::Used);
        assert_eq!(stored.verification_location.as_deref(), Some("Main entrance"));

        let second = backend.redeem(&request).await.unwrap();
        assert!(!second.success);
        assert_eq!(second.message, "Ticket already used");
    }

    #[tokio::test]
    async fn test_queued_results_and_errors() {
        let backend = MockTicketBackend::new();
        backend
            .push_redeem_result(Ok(RedeemOutcome::rejected("Closed gate")))
            .await;
        backend.set_next_error(BackendError::Unauthorized).await;

        let request = RedeemRequest {
            ticket_id: "t-1".to_string(),
            qr_code: fixtures::code("u1", "o1"),
            location: None,
            note: None,
        };

        assert!(matches!(
            backend.redeem(&request).await,
            Err(BackendError::Unauthorized)
        ));
        let outcome = backend.redeem(&request).await.unwrap();
        assert_eq!(outcome.message, "Closed gate");
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_tracking_survives_abort() {
        let backend = Arc::new(MockTicketBackend::new());
        backend.set_delay(Duration::from_secs(5)).await;

        let task = {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move { backend.lookup("TICKEASY|u|o").await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.in_flight(), 1);

        task.abort();
        let _ = task.await;
        assert_eq!(backend.in_flight(), 0);
        assert_eq!(backend.max_in_flight(), 1);
    }
}
