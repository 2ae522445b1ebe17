//! End-to-end tests of the redemption workflow against the mock backend and
//! scanner. Time is paused, so resume delays elapse deterministically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use tickeasy_core::backend::BackendError;
use tickeasy_core::redemption::{
    create_workflow_channel, ErrorOrigin, OperatorAction, RedemptionConfig,
    RedemptionController, ResumeReason, SessionSnapshot, WorkflowEvent, WorkflowState,
    INVALID_CODE_MESSAGE,
};
use tickeasy_core::scanner::{GatedScanner, ScanCapability, ScanEvent};
use tickeasy_core::testing::{fixtures, MockScanner, MockTicketBackend};
use tickeasy_core::ticket::{RedeemOutcome, RedeemedTicket, TicketStatus};

const ERROR_DELAY: Duration = Duration::from_millis(2000);
const SUCCESS_DELAY: Duration = Duration::from_millis(3000);

fn purchased_code() -> String {
    fixtures::code("u1", "o1")
}

fn used_code() -> String {
    fixtures::code("u2", "o2")
}

fn refunded_code() -> String {
    fixtures::code("u3", "o3")
}

struct Harness {
    controller: RedemptionController,
    backend: Arc<MockTicketBackend>,
    scanner: Arc<MockScanner>,
    snapshots: Arc<Mutex<Vec<SessionSnapshot>>>,
}

impl Harness {
    async fn new() -> Self {
        let backend = Arc::new(MockTicketBackend::new());
        backend
            .add_ticket(&purchased_code(), fixtures::purchased_ticket("t-1"))
            .await;
        backend
            .add_ticket(&used_code(), fixtures::ticket("t-2", TicketStatus::Used))
            .await;
        backend
            .add_ticket(&refunded_code(), fixtures::ticket("t-3", TicketStatus::Refunded))
            .await;

        let scanner = Arc::new(MockScanner::new());
        let (handle, receiver) = create_workflow_channel(16);

        // Every published snapshot must agree with the real scanner.
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&snapshots);
        let observed = Arc::clone(&scanner);

        let mut controller = RedemptionController::new(
            RedemptionConfig::default(),
            backend.clone(),
            scanner.clone(),
            handle,
            receiver,
        )
        .with_update_callback(Arc::new(move |snapshot: &SessionSnapshot| {
            let scanning = snapshot.state == WorkflowState::Scanning;
            assert_eq!(observed.is_active(), scanning, "scanner out of sync in {}", snapshot.state);
            assert_eq!(snapshot.scanner_active, scanning);
            sink.lock().unwrap().push(snapshot.clone());
        }));
        controller.start();

        Self {
            controller,
            backend,
            scanner,
            snapshots,
        }
    }

    fn scan(&mut self, raw: &str) {
        self.controller
            .dispatch(WorkflowEvent::Scan(ScanEvent::Decoded(raw.to_string())));
    }

    fn act(&mut self, action: OperatorAction) {
        self.controller.dispatch(WorkflowEvent::Operator(action));
    }

    /// Process the next queued event.
    async fn step(&mut self) -> WorkflowState {
        self.controller
            .process_next()
            .await
            .expect("controller shut down unexpectedly")
    }

    /// Assert that no event arrives within `window`.
    async fn assert_quiet(&mut self, window: Duration) {
        let result = tokio::time::timeout(window, self.controller.process_next()).await;
        assert!(result.is_err(), "unexpected event, state now {:?}", result);
    }

    fn state(&self) -> WorkflowState {
        self.controller.state()
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.controller.snapshot()
    }

    fn assert_scanner_matches_state(&self) {
        assert_eq!(
            self.scanner.is_active(),
            self.state() == WorkflowState::Scanning,
            "scanner out of sync in {}",
            self.state()
        );
    }

    /// Scan the purchased ticket and wait for it to be displayed.
    async fn ready_to_redeem(&mut self) {
        self.scan(&purchased_code());
        assert_eq!(self.state(), WorkflowState::LookingUp);
        assert_eq!(self.step().await, WorkflowState::ReadyToRedeem);
    }
}

#[tokio::test(start_paused = true)]
async fn test_starts_scanning_with_scanner_active() {
    let h = Harness::new().await;

    assert_eq!(h.state(), WorkflowState::Scanning);
    assert!(h.scanner.is_active());
    assert_eq!(h.scanner.activation_count(), 1);
    assert!(h.snapshot().ticket.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_code_never_reaches_backend() {
    let mut h = Harness::new().await;

    for raw in ["BADTAG|u1|o1", "TICKEASY|u1", "", "TICKEASY|u1|o1|extra"] {
        h.act(OperatorAction::ScanNewTicket);
        h.scan(raw);

        assert_eq!(h.state(), WorkflowState::Error);
        assert_eq!(h.snapshot().error.as_deref(), Some(INVALID_CODE_MESSAGE));
        assert_eq!(h.snapshot().error_origin, Some(ErrorOrigin::InvalidCode));
        h.assert_scanner_matches_state();
    }

    assert_eq!(h.snapshot().error.as_deref(), Some("invalid QR code format"));
    assert_eq!(h.backend.call_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_code_resumes_after_error_delay() {
    let mut h = Harness::new().await;

    h.scan("not a ticket");
    assert_eq!(h.snapshot().pending_resume, Some(ResumeReason::AfterError));

    let started = Instant::now();
    assert_eq!(h.step().await, WorkflowState::Scanning);
    assert!(started.elapsed() >= ERROR_DELAY);
    assert!(h.scanner.is_active());
    assert!(h.snapshot().pending_resume.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_purchased_ticket_is_ready_to_redeem() {
    let mut h = Harness::new().await;

    h.scan(&purchased_code());
    assert_eq!(h.state(), WorkflowState::LookingUp);
    assert!(!h.scanner.is_active());

    assert_eq!(h.step().await, WorkflowState::ReadyToRedeem);
    let snapshot = h.snapshot();
    assert_eq!(snapshot.ticket.unwrap().ticket_id, "t-1");
    assert_eq!(snapshot.scanned_code.as_deref(), Some(purchased_code().as_str()));
    assert!(!h.scanner.is_active());
    assert_eq!(h.backend.recorded_lookups().await, vec![purchased_code()]);
}

#[tokio::test(start_paused = true)]
async fn test_used_and_refunded_tickets_are_blocked() {
    let mut h = Harness::new().await;

    for code in [used_code(), refunded_code()] {
        h.act(OperatorAction::ScanNewTicket);
        h.scan(&code);
        assert_eq!(h.step().await, WorkflowState::Blocked);
        h.assert_scanner_matches_state();

        // No redemption is offered for an absorbing status.
        h.act(OperatorAction::ConfirmRedemption);
        assert_eq!(h.state(), WorkflowState::Blocked);
    }

    assert!(h.backend.recorded_redeems().await.is_empty());

    // Blocked stays put until the operator asks for a new scan.
    h.assert_quiet(Duration::from_secs(30)).await;
    assert_eq!(h.state(), WorkflowState::Blocked);
}

#[tokio::test(start_paused = true)]
async fn test_blocked_used_ticket_shows_verification() {
    let mut h = Harness::new().await;

    h.scan(&used_code());
    h.step().await;

    let ticket = h.snapshot().ticket.unwrap();
    let verification = ticket.verification().expect("used ticket carries verification");
    assert_eq!(verification.verified_by.as_deref(), Some("gate-2"));
}

#[tokio::test(start_paused = true)]
async fn test_successful_redemption_returns_to_scanning_after_delay() {
    let mut h = Harness::new().await;
    h.ready_to_redeem().await;

    h.act(OperatorAction::ConfirmRedemption);
    assert_eq!(h.state(), WorkflowState::Redeeming);
    assert!(!h.scanner.is_active());

    assert_eq!(h.step().await, WorkflowState::Redeemed);
    let snapshot = h.snapshot();
    assert_eq!(snapshot.success.as_deref(), Some("Ticket verified successfully"));
    assert!(snapshot.ticket.is_some());
    assert_eq!(snapshot.pending_resume, Some(ResumeReason::AfterRedemption));
    assert!(!h.scanner.is_active());

    let started = Instant::now();
    assert_eq!(h.step().await, WorkflowState::Scanning);
    assert!(started.elapsed() >= SUCCESS_DELAY);

    let snapshot = h.snapshot();
    assert!(snapshot.ticket.is_none());
    assert!(h.scanner.is_active());

    // The local copy is discarded, never flipped; the backend owns the status.
    let stored = h.backend.ticket(&purchased_code()).await.unwrap();
    assert_eq!(stored.status, TicketStatus::Used);
}

#[tokio::test(start_paused = true)]
async fn test_partial_success_details_still_redeem() {
    let mut h = Harness::new().await;
    h.backend
        .push_redeem_result(Ok(RedeemOutcome::accepted("Ticket verified successfully")
            .with_data(RedeemedTicket {
                ticket_id: Some("t-1".to_string()),
                ..Default::default()
            })))
        .await;
    h.ready_to_redeem().await;

    h.act(OperatorAction::ConfirmRedemption);
    assert_eq!(h.step().await, WorkflowState::Redeemed);
    assert!(h.snapshot().error.is_none());
    assert_eq!(h.step().await, WorkflowState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn test_ticket_with_naive_session_date_is_displayed() {
    let mut h = Harness::new().await;
    let code = fixtures::code("u4", "o4");
    let mut ticket = fixtures::purchased_ticket("t-4");
    ticket.concert_info.session_date = "2025-04-12T19:30:00".to_string();
    h.backend.add_ticket(&code, ticket).await;

    h.scan(&code);
    assert_eq!(h.step().await, WorkflowState::ReadyToRedeem);
    assert_eq!(h.snapshot().ticket.unwrap().ticket_id, "t-4");
}

#[tokio::test(start_paused = true)]
async fn test_redeem_request_carries_identity_and_context() {
    let mut h = Harness::new().await;
    h.ready_to_redeem().await;

    h.act(OperatorAction::ConfirmRedemption);
    h.step().await;

    let redeems = h.backend.recorded_redeems().await;
    assert_eq!(redeems.len(), 1);
    assert_eq!(redeems[0].ticket_id, "t-1");
    assert_eq!(redeems[0].qr_code, purchased_code());
    assert_eq!(redeems[0].location.as_deref(), Some("Main entrance"));
    assert_eq!(redeems[0].note.as_deref(), Some("Regular check-in"));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_redemption_keeps_ticket_displayed() {
    let mut h = Harness::new().await;
    h.backend
        .push_redeem_result(Ok(RedeemOutcome::rejected("already used")))
        .await;
    h.ready_to_redeem().await;

    h.act(OperatorAction::ConfirmRedemption);
    assert_eq!(h.step().await, WorkflowState::ReadyToRedeem);

    let snapshot = h.snapshot();
    assert_eq!(snapshot.ticket.unwrap().ticket_id, "t-1");
    assert_eq!(snapshot.error.as_deref(), Some("already used"));
    assert!(snapshot.pending_resume.is_none());
    assert!(!h.scanner.is_active());

    // The operator may confirm again.
    h.act(OperatorAction::ConfirmRedemption);
    assert_eq!(h.state(), WorkflowState::Redeeming);
    assert!(h.snapshot().error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_lookup_fault_never_displays_a_ticket() {
    let mut h = Harness::new().await;

    // Unknown code: the backend answers 404.
    h.scan(&fixtures::code("nobody", "none"));
    assert_eq!(h.step().await, WorkflowState::Error);
    assert_eq!(h.snapshot().error.as_deref(), Some("Ticket not found"));
    assert!(h.snapshot().ticket.is_none());

    assert_eq!(h.step().await, WorkflowState::Scanning);

    // Transport-level fault.
    h.backend.set_next_error(BackendError::Unauthorized).await;
    h.scan(&purchased_code());
    assert_eq!(h.step().await, WorkflowState::Error);
    assert_eq!(h.snapshot().error_origin, Some(ErrorOrigin::Lookup));
    assert!(h.snapshot().ticket.is_none());

    let started = Instant::now();
    assert_eq!(h.step().await, WorkflowState::Scanning);
    assert!(started.elapsed() >= ERROR_DELAY);

    let states: Vec<WorkflowState> = h.snapshots.lock().unwrap().iter().map(|s| s.state).collect();
    assert!(!states.contains(&WorkflowState::ReadyToRedeem));
    assert!(!states.contains(&WorkflowState::Blocked));
}

#[tokio::test(start_paused = true)]
async fn test_redeem_fault_retains_ticket_without_auto_resume() {
    let mut h = Harness::new().await;
    h.ready_to_redeem().await;

    h.backend
        .set_next_error(BackendError::Api {
            status: 500,
            message: "Internal server error".to_string(),
        })
        .await;
    h.act(OperatorAction::ConfirmRedemption);
    assert_eq!(h.step().await, WorkflowState::Error);

    let snapshot = h.snapshot();
    assert_eq!(snapshot.error.as_deref(), Some("Internal server error"));
    assert_eq!(snapshot.error_origin, Some(ErrorOrigin::Redemption));
    assert_eq!(snapshot.ticket.unwrap().ticket_id, "t-1");
    assert!(snapshot.pending_resume.is_none());

    h.assert_quiet(Duration::from_secs(30)).await;
    assert_eq!(h.state(), WorkflowState::Error);
    assert!(!h.scanner.is_active());

    // The operator retries by confirming again.
    h.act(OperatorAction::ConfirmRedemption);
    assert_eq!(h.state(), WorkflowState::Redeeming);
    assert_eq!(h.step().await, WorkflowState::Redeemed);
    assert_eq!(h.backend.recorded_redeems().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_scanner_fault_requires_manual_retry() {
    let mut h = Harness::new().await;

    h.controller.dispatch(WorkflowEvent::Scan(ScanEvent::CapabilityFault(
        "permission denied".to_string(),
    )));

    assert_eq!(h.state(), WorkflowState::Error);
    let snapshot = h.snapshot();
    assert_eq!(snapshot.error_origin, Some(ErrorOrigin::Scanner));
    assert!(snapshot.error.unwrap().contains("permission denied"));
    assert!(snapshot.pending_resume.is_none());

    h.assert_quiet(Duration::from_secs(30)).await;
    assert_eq!(h.state(), WorkflowState::Error);

    h.act(OperatorAction::ScanNewTicket);
    assert_eq!(h.state(), WorkflowState::Scanning);
    assert!(h.scanner.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_no_detection_ticks_are_ignored() {
    let mut h = Harness::new().await;
    let published = h.snapshots.lock().unwrap().len();

    for _ in 0..5 {
        h.controller
            .dispatch(WorkflowEvent::Scan(ScanEvent::NoDetection));
    }

    assert_eq!(h.state(), WorkflowState::Scanning);
    assert_eq!(h.snapshots.lock().unwrap().len(), published);
}

#[tokio::test(start_paused = true)]
async fn test_decodes_outside_scanning_are_ignored() {
    let mut h = Harness::new().await;
    h.ready_to_redeem().await;

    h.scan(&used_code());
    assert_eq!(h.state(), WorkflowState::ReadyToRedeem);
    assert_eq!(h.snapshot().ticket.unwrap().ticket_id, "t-1");
    assert_eq!(h.backend.recorded_lookups().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_scan_new_ticket_clears_every_non_idle_state() {
    let mut h = Harness::new().await;
    h.backend.set_delay(Duration::from_secs(1)).await;

    // Error with a pending resume.
    h.scan("garbage");
    assert_eq!(h.state(), WorkflowState::Error);
    assert_reset_by_new_scan(&mut h).await;

    // LookingUp, request outstanding.
    h.scan(&purchased_code());
    assert_eq!(h.state(), WorkflowState::LookingUp);
    assert_reset_by_new_scan(&mut h).await;

    // ReadyToRedeem.
    h.ready_to_redeem().await;
    assert_reset_by_new_scan(&mut h).await;

    // Redeeming, request outstanding.
    h.ready_to_redeem().await;
    h.backend
        .push_redeem_result(Ok(RedeemOutcome::accepted("Ticket verified successfully")))
        .await;
    h.act(OperatorAction::ConfirmRedemption);
    assert_eq!(h.state(), WorkflowState::Redeeming);
    assert_reset_by_new_scan(&mut h).await;

    // Redeemed, success resume pending.
    h.ready_to_redeem().await;
    h.backend
        .push_redeem_result(Ok(RedeemOutcome::accepted("Ticket verified successfully")))
        .await;
    h.act(OperatorAction::ConfirmRedemption);
    assert_eq!(h.step().await, WorkflowState::Redeemed);
    assert_reset_by_new_scan(&mut h).await;

    // Blocked.
    h.scan(&used_code());
    assert_eq!(h.step().await, WorkflowState::Blocked);
    assert_reset_by_new_scan(&mut h).await;
}

async fn assert_reset_by_new_scan(h: &mut Harness) {
    h.act(OperatorAction::ScanNewTicket);

    assert_eq!(h.state(), WorkflowState::Scanning);
    let snapshot = h.snapshot();
    assert!(snapshot.ticket.is_none());
    assert!(snapshot.scanned_code.is_none());
    assert!(snapshot.error.is_none());
    assert!(snapshot.success.is_none());
    assert!(snapshot.pending_resume.is_none());
    assert!(h.scanner.is_active());
    assert!(!h.controller.has_request_in_flight());

    // Neither a cancelled timer nor an abandoned request may fire later.
    h.assert_quiet(Duration::from_secs(10)).await;
    assert_eq!(h.state(), WorkflowState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_request_outstanding() {
    let mut h = Harness::new().await;
    h.backend.set_delay(Duration::from_secs(5)).await;

    h.scan(&purchased_code());
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.backend.in_flight(), 1);

    // Abandon the lookup and scan a different ticket straight away.
    h.act(OperatorAction::ScanNewTicket);
    tokio::task::yield_now().await;
    h.scan(&used_code());

    assert_eq!(h.step().await, WorkflowState::Blocked);
    assert_eq!(h.snapshot().ticket.unwrap().ticket_id, "t-2");
    assert_eq!(h.backend.max_in_flight(), 1);
    assert_eq!(h.backend.in_flight(), 0);
    assert_eq!(h.backend.recorded_lookups().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stale_completion_is_ignored() {
    let mut h = Harness::new().await;
    h.backend.set_delay(Duration::from_secs(5)).await;

    h.scan(&purchased_code());
    assert_eq!(h.state(), WorkflowState::LookingUp);

    h.controller.dispatch(WorkflowEvent::LookupFinished {
        request_id: 9_999,
        result: Ok(fixtures::ticket("t-forged", TicketStatus::Purchased)),
    });
    assert_eq!(h.state(), WorkflowState::LookingUp);
    assert!(h.snapshot().ticket.is_none());

    // A completion of the wrong kind is stale as well.
    h.controller.dispatch(WorkflowEvent::RedeemFinished {
        request_id: 1,
        result: Ok(RedeemOutcome::accepted("forged")),
    });
    assert_eq!(h.state(), WorkflowState::LookingUp);

    assert_eq!(h.step().await, WorkflowState::ReadyToRedeem);
    assert_eq!(h.snapshot().ticket.unwrap().ticket_id, "t-1");
}

#[tokio::test(start_paused = true)]
async fn test_full_walk_keeps_scanner_in_sync() {
    let mut h = Harness::new().await;

    h.scan("nope");
    h.step().await;
    h.scan(&used_code());
    h.step().await;
    h.act(OperatorAction::ScanNewTicket);
    h.ready_to_redeem().await;
    h.act(OperatorAction::ConfirmRedemption);
    h.step().await;
    h.step().await;

    let states: Vec<WorkflowState> = h.snapshots.lock().unwrap().iter().map(|s| s.state).collect();
    for expected in [
        WorkflowState::Scanning,
        WorkflowState::Error,
        WorkflowState::LookingUp,
        WorkflowState::Blocked,
        WorkflowState::ReadyToRedeem,
        WorkflowState::Redeeming,
        WorkflowState::Redeemed,
    ] {
        assert!(states.contains(&expected), "never reached {}", expected);
    }
    assert_eq!(h.state(), WorkflowState::Scanning);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_suspends_scanner() {
    let mut h = Harness::new().await;
    assert!(h.scanner.is_active());

    h.controller.handle().shutdown().await;
    assert!(h.controller.process_next().await.is_none());
    assert!(!h.scanner.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_run_with_gated_scanner() {
    let backend = Arc::new(MockTicketBackend::new());
    backend
        .add_ticket(&purchased_code(), fixtures::purchased_ticket("t-1"))
        .await;

    let (handle, receiver) = create_workflow_channel(16);
    let scanner = Arc::new(GatedScanner::new(handle.clone()));

    let (updates_tx, mut updates) = tokio::sync::mpsc::unbounded_channel();
    let controller = RedemptionController::new(
        RedemptionConfig::default(),
        backend.clone(),
        scanner.clone(),
        handle.clone(),
        receiver,
    )
    .with_update_callback(Arc::new(move |snapshot: &SessionSnapshot| {
        let _ = updates_tx.send(snapshot.clone());
    }));

    // Suspended until the controller starts.
    assert!(!scanner.feed(ScanEvent::Decoded(purchased_code())).await);

    let task = tokio::spawn(controller.run());
    assert_eq!(updates.recv().await.unwrap().state, WorkflowState::Scanning);
    assert!(scanner.is_active());

    assert!(scanner.feed(ScanEvent::Decoded(purchased_code())).await);
    assert_eq!(updates.recv().await.unwrap().state, WorkflowState::LookingUp);
    assert_eq!(updates.recv().await.unwrap().state, WorkflowState::ReadyToRedeem);

    // Gated while a ticket is displayed.
    assert!(!scanner.feed(ScanEvent::Decoded(used_code())).await);

    handle.confirm_redemption().await;
    assert_eq!(updates.recv().await.unwrap().state, WorkflowState::Redeeming);
    assert_eq!(updates.recv().await.unwrap().state, WorkflowState::Redeemed);
    assert_eq!(updates.recv().await.unwrap().state, WorkflowState::Scanning);
    assert!(scanner.is_active());

    handle.shutdown().await;
    task.await.unwrap();
    assert!(!scanner.is_active());
    assert_eq!(backend.recorded_lookups().await, vec![purchased_code()]);
}
