//! Redemption workflow controller.
//!
//! Reacts to scan events, request completions, resume timers and operator
//! actions, one event at a time. Backend requests run as spawned tasks that
//! post their completion back onto the workflow channel, so the controller
//! never blocks while a request is outstanding.
//!
//! Invariants:
//! - The scanner is active exactly when the state is `Scanning`.
//! - At most one backend request is outstanding. Abandoning a session aborts
//!   it, and completions are matched by request id.
//! - Leaving a state that scheduled an auto-resume cancels the resume.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::backend::TicketBackend;
use crate::config::RedemptionConfig;
use crate::scanner::{ScanCapability, ScanEvent};
use crate::ticket::{RedeemOutcome, RedeemRequest, ScannedCode, Ticket};

use super::events::{RequestId, WorkflowEvent, WorkflowHandle, WorkflowReceiver};
use super::timer::{ResumeReason, ResumeTimer, ResumeToken};
use super::types::{
    ErrorOrigin, OperatorAction, Session, SessionSnapshot, WorkflowState, INVALID_CODE_MESSAGE,
};

/// Callback invoked with a snapshot after every state change.
pub type SessionUpdateCallback = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Lookup,
    Redeem,
}

/// The one backend request allowed to be outstanding.
struct InFlight {
    id: RequestId,
    kind: RequestKind,
    task: JoinHandle<()>,
}

/// Drives a scan session from scanning to redemption.
pub struct RedemptionController {
    config: RedemptionConfig,
    backend: Arc<dyn TicketBackend>,
    scanner: Arc<dyn ScanCapability>,
    handle: WorkflowHandle,
    receiver: WorkflowReceiver,
    timer: ResumeTimer,
    session: Session,
    in_flight: Option<InFlight>,
    next_request_id: RequestId,
    on_update: Option<SessionUpdateCallback>,
    started: bool,
}

impl RedemptionController {
    /// Create a controller. `handle` and `receiver` must come from the same
    /// [`create_workflow_channel`](super::create_workflow_channel) call the
    /// scanner was given.
    pub fn new(
        config: RedemptionConfig,
        backend: Arc<dyn TicketBackend>,
        scanner: Arc<dyn ScanCapability>,
        handle: WorkflowHandle,
        receiver: WorkflowReceiver,
    ) -> Self {
        Self {
            config,
            backend,
            scanner,
            timer: ResumeTimer::new(handle.clone()),
            handle,
            receiver,
            session: Session::new(),
            in_flight: None,
            next_request_id: 0,
            on_update: None,
            started: false,
        }
    }

    /// Set a callback to be notified after every state change.
    pub fn with_update_callback(mut self, callback: SessionUpdateCallback) -> Self {
        self.on_update = Some(callback);
        self
    }

    /// Handle for pushing operator actions and scan events.
    pub fn handle(&self) -> WorkflowHandle {
        self.handle.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> WorkflowState {
        self.session.state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Returns true while a backend request is outstanding.
    pub fn has_request_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Enter the initial `Scanning` state and activate the scanner.
    pub fn start(&mut self) {
        if self.started {
            warn!("Redemption controller already started");
            return;
        }
        self.started = true;

        info!(session_id = %self.session.id(), "Starting redemption session");
        self.transition(WorkflowState::Scanning);
    }

    /// Process events until shutdown, starting first if needed.
    pub async fn run(mut self) {
        if !self.started {
            self.start();
        }
        while self.process_next().await.is_some() {}
        info!(session_id = %self.session.id(), "Redemption session ended");
    }

    /// Wait for the next event and handle it.
    ///
    /// Returns the resulting state, or `None` once the controller has been
    /// shut down.
    pub async fn process_next(&mut self) -> Option<WorkflowState> {
        let event = self.receiver.recv().await?;
        if matches!(event, WorkflowEvent::Shutdown) {
            self.teardown();
            return None;
        }
        self.dispatch(event);
        Some(self.session.state())
    }

    /// Handle one event. Must be called within a tokio runtime.
    pub fn dispatch(&mut self, event: WorkflowEvent) {
        trace!(
            session_id = %self.session.id(),
            state = self.session.state().state_type(),
            event = event.event_type(),
            "Workflow event"
        );

        match event {
            WorkflowEvent::Scan(ScanEvent::Decoded(raw)) => self.on_decoded(raw),
            WorkflowEvent::Scan(ScanEvent::NoDetection) => {}
            WorkflowEvent::Scan(ScanEvent::CapabilityFault(message)) => {
                self.on_scanner_fault(message)
            }
            WorkflowEvent::Operator(OperatorAction::ConfirmRedemption) => self.on_confirm(),
            WorkflowEvent::Operator(OperatorAction::ScanNewTicket) => self.on_scan_new_ticket(),
            WorkflowEvent::LookupFinished { request_id, result } => {
                if !self.complete_request(request_id, RequestKind::Lookup) {
                    return;
                }
                match result {
                    Ok(ticket) => self.on_ticket_found(ticket),
                    Err(e) => {
                        warn!(session_id = %self.session.id(), "Ticket lookup failed: {}", e);
                        self.fail(ErrorOrigin::Lookup, e.to_string());
                    }
                }
            }
            WorkflowEvent::RedeemFinished { request_id, result } => {
                if !self.complete_request(request_id, RequestKind::Redeem) {
                    return;
                }
                match result {
                    Ok(outcome) => self.on_redeem_outcome(outcome),
                    Err(e) => {
                        warn!(session_id = %self.session.id(), "Redemption request failed: {}", e);
                        self.fail(ErrorOrigin::Redemption, e.to_string());
                    }
                }
            }
            WorkflowEvent::ResumeDue(token) => self.on_resume_due(token),
            WorkflowEvent::Shutdown => self.teardown(),
        }
    }

    /// Suspend the scanner and cancel everything outstanding.
    pub fn teardown(&mut self) {
        self.abort_in_flight();
        self.session.cancel_resume();
        self.scanner.suspend();
        self.session.scanner_active = false;
        debug!(session_id = %self.session.id(), "Redemption controller torn down");
    }

    // ========================================================================
    // Event handlers
    // ========================================================================

    fn on_decoded(&mut self, raw: String) {
        if !self.session.state().is_idle() {
            debug!(
                "Ignoring decoded payload while {}",
                self.session.state().state_type()
            );
            return;
        }

        let Some(code) = ScannedCode::parse(&raw) else {
            warn!(session_id = %self.session.id(), "Rejected malformed QR payload");
            self.fail(ErrorOrigin::InvalidCode, INVALID_CODE_MESSAGE.to_string());
            return;
        };

        info!(
            session_id = %self.session.id(),
            user_id = %code.user_id,
            order_id = %code.order_id,
            "Scanned ticket code"
        );

        self.session.clear_messages();
        self.session.ticket = None;
        self.session.scanned = Some(code.clone());
        self.transition(WorkflowState::LookingUp);
        self.issue_lookup(code.raw);
    }

    fn on_scanner_fault(&mut self, message: String) {
        if !self.session.state().is_idle() {
            warn!(
                "Scanner reported a fault while {}: {}",
                self.session.state().state_type(),
                message
            );
            return;
        }

        warn!(session_id = %self.session.id(), "Scanner unavailable: {}", message);
        self.fail(
            ErrorOrigin::Scanner,
            format!("Cannot access the camera: {}", message),
        );
    }

    fn on_ticket_found(&mut self, ticket: Ticket) {
        let next = if ticket.status.is_redeemable() {
            WorkflowState::ReadyToRedeem
        } else {
            WorkflowState::Blocked
        };

        info!(
            session_id = %self.session.id(),
            ticket_id = %ticket.ticket_id,
            status = %ticket.status,
            "Ticket found"
        );

        self.session.ticket = Some(ticket);
        self.transition(next);
    }

    fn on_confirm(&mut self) {
        let retrying_failed_redemption = self.session.state() == WorkflowState::Error
            && self.session.error_origin() == Some(ErrorOrigin::Redemption);

        if self.session.state() != WorkflowState::ReadyToRedeem && !retrying_failed_redemption {
            debug!(
                "Ignoring redemption confirmation while {}",
                self.session.state().state_type()
            );
            return;
        }

        let (Some(ticket), Some(code)) = (&self.session.ticket, &self.session.scanned) else {
            warn!("Redemption confirmed without a displayed ticket");
            return;
        };
        if !ticket.status.is_redeemable() {
            debug!("Ignoring redemption confirmation for a {} ticket", ticket.status);
            return;
        }

        let request = RedeemRequest {
            ticket_id: ticket.ticket_id.clone(),
            qr_code: code.raw.clone(),
            location: non_empty(&self.config.location),
            note: non_empty(&self.config.note),
        };

        info!(
            session_id = %self.session.id(),
            ticket_id = %request.ticket_id,
            "Redeeming ticket"
        );

        self.session.clear_messages();
        self.transition(WorkflowState::Redeeming);
        self.issue_redeem(request);
    }

    fn on_redeem_outcome(&mut self, outcome: RedeemOutcome) {
        if outcome.success {
            info!(session_id = %self.session.id(), "Ticket redeemed: {}", outcome.message);
            self.session.success = Some(outcome.message);
            self.schedule_resume(
                Duration::from_millis(self.config.success_resume_delay_ms),
                ResumeReason::AfterRedemption,
            );
            self.transition(WorkflowState::Redeemed);
        } else {
            warn!(session_id = %self.session.id(), "Redemption rejected: {}", outcome.message);
            let message = if outcome.message.is_empty() {
                "Redemption was rejected".to_string()
            } else {
                outcome.message
            };
            self.session.error = Some(message);
            self.transition(WorkflowState::ReadyToRedeem);
        }
    }

    fn on_resume_due(&mut self, token: ResumeToken) {
        let is_current = self
            .session
            .pending_resume
            .as_ref()
            .is_some_and(|p| p.token() == token);
        if !is_current {
            debug!("Ignoring stale resume {}", token.value());
            return;
        }

        if let Some(pending) = self.session.pending_resume.take() {
            debug!(
                session_id = %self.session.id(),
                reason = ?pending.reason(),
                "Resuming scanner"
            );
        }

        // Messages stay visible until the next scan; the ticket does not.
        self.session.discard_ticket();
        self.transition(WorkflowState::Scanning);
    }

    fn on_scan_new_ticket(&mut self) {
        info!(
            session_id = %self.session.id(),
            from = self.session.state().state_type(),
            "Operator requested a new scan"
        );

        self.abort_in_flight();
        self.session.reset();
        self.transition(WorkflowState::Scanning);
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Record a failure and enter `Error`. The message is set before the
    /// transition is published.
    fn fail(&mut self, origin: ErrorOrigin, message: String) {
        self.session.cancel_resume();
        if !origin.retains_ticket() {
            self.session.discard_ticket();
        }
        self.session.success = None;
        self.session.error = Some(message);
        self.session.error_origin = Some(origin);

        if origin.auto_resumes() {
            self.schedule_resume(
                Duration::from_millis(self.config.error_resume_delay_ms),
                ResumeReason::AfterError,
            );
        }
        self.transition(WorkflowState::Error);
    }

    fn schedule_resume(&mut self, delay: Duration, reason: ResumeReason) {
        self.session.cancel_resume();
        let pending = self.timer.schedule(delay, reason);
        debug!(
            "Scheduled resume {} in {:?} ({:?})",
            pending.token().value(),
            delay,
            reason
        );
        self.session.pending_resume = Some(pending);
    }

    /// Move to `next`, keeping the scanner active exactly in `Scanning`.
    fn transition(&mut self, next: WorkflowState) {
        let previous = self.session.state;
        self.session.state = next;

        let active = next.is_idle();
        if active {
            self.scanner.activate();
        } else {
            self.scanner.suspend();
        }
        self.session.scanner_active = active;

        if previous != next {
            debug!(
                session_id = %self.session.id(),
                "Workflow transition {} -> {}",
                previous.state_type(),
                next.state_type()
            );
        }

        if let Some(callback) = &self.on_update {
            callback(&self.session.snapshot());
        }
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        self.next_request_id
    }

    fn issue_lookup(&mut self, code: String) {
        let request_id = self.next_request_id();
        let backend = Arc::clone(&self.backend);
        let handle = self.handle.clone();

        let task = tokio::spawn(async move {
            let result = backend.lookup(&code).await;
            handle
                .emit(WorkflowEvent::LookupFinished { request_id, result })
                .await;
        });

        self.track_request(request_id, RequestKind::Lookup, task);
    }

    fn issue_redeem(&mut self, request: RedeemRequest) {
        let request_id = self.next_request_id();
        let backend = Arc::clone(&self.backend);
        let handle = self.handle.clone();

        let task = tokio::spawn(async move {
            let result = backend.redeem(&request).await;
            handle
                .emit(WorkflowEvent::RedeemFinished { request_id, result })
                .await;
        });

        self.track_request(request_id, RequestKind::Redeem, task);
    }

    fn track_request(&mut self, id: RequestId, kind: RequestKind, task: JoinHandle<()>) {
        if let Some(previous) = self.in_flight.take() {
            // Unreachable through the state machine; keep the invariant anyway.
            warn!("Aborting outstanding {:?} request {}", previous.kind, previous.id);
            previous.task.abort();
        }
        self.in_flight = Some(InFlight { id, kind, task });
    }

    /// Clear the in-flight slot if `id` is the outstanding request.
    /// Returns false for stale completions.
    fn complete_request(&mut self, id: RequestId, kind: RequestKind) -> bool {
        match &self.in_flight {
            Some(current) if current.id == id && current.kind == kind => {
                self.in_flight = None;
                true
            }
            _ => {
                debug!("Ignoring stale {:?} completion {}", kind, id);
                false
            }
        }
    }

    fn abort_in_flight(&mut self) {
        if let Some(request) = self.in_flight.take() {
            debug!("Aborting {:?} request {}", request.kind, request.id);
            request.task.abort();
        }
    }
}

impl Drop for RedemptionController {
    fn drop(&mut self) {
        if let Some(request) = self.in_flight.take() {
            request.task.abort();
        }
        if self.session.scanner_active {
            self.scanner.suspend();
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
