use tokio::sync::mpsc;

use crate::backend::BackendError;
use crate::scanner::ScanEvent;
use crate::ticket::{RedeemOutcome, Ticket};

use super::timer::ResumeToken;
use super::types::OperatorAction;

/// Identifier of one backend request issued by the controller.
pub type RequestId = u64;

/// Everything the controller reacts to, consumed one at a time.
#[derive(Debug)]
pub enum WorkflowEvent {
    /// Pushed by the scan capability.
    Scan(ScanEvent),
    /// Pushed by the operator's UI.
    Operator(OperatorAction),
    /// A lookup request completed.
    LookupFinished {
        request_id: RequestId,
        result: Result<Ticket, BackendError>,
    },
    /// A redemption request completed.
    RedeemFinished {
        request_id: RequestId,
        result: Result<RedeemOutcome, BackendError>,
    },
    /// A scheduled auto-resume is due.
    ResumeDue(ResumeToken),
    /// Tear the controller down.
    Shutdown,
}

impl WorkflowEvent {
    /// Short name for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::Scan(ScanEvent::Decoded(_)) => "scan_decoded",
            WorkflowEvent::Scan(ScanEvent::NoDetection) => "scan_no_detection",
            WorkflowEvent::Scan(ScanEvent::CapabilityFault(_)) => "scan_fault",
            WorkflowEvent::Operator(OperatorAction::ConfirmRedemption) => "confirm_redemption",
            WorkflowEvent::Operator(OperatorAction::ScanNewTicket) => "scan_new_ticket",
            WorkflowEvent::LookupFinished { .. } => "lookup_finished",
            WorkflowEvent::RedeemFinished { .. } => "redeem_finished",
            WorkflowEvent::ResumeDue(_) => "resume_due",
            WorkflowEvent::Shutdown => "shutdown",
        }
    }
}

/// Handle for pushing events to a redemption controller
///
/// This is cheaply cloneable and can be shared across tasks and threads.
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    tx: mpsc::Sender<WorkflowEvent>,
}

impl WorkflowHandle {
    /// Create a new workflow handle from a channel sender
    pub fn new(tx: mpsc::Sender<WorkflowEvent>) -> Self {
        Self { tx }
    }

    /// Send an event, waiting for channel capacity.
    ///
    /// Returns false if the controller is gone. The failure is logged, the
    /// caller is not failed.
    pub async fn emit(&self, event: WorkflowEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Workflow controller is gone, dropping {}", e.0.event_type());
                false
            }
        }
    }

    /// Send an event from a thread that is not running async code.
    pub fn emit_blocking(&self, event: WorkflowEvent) -> bool {
        match self.tx.blocking_send(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Workflow controller is gone, dropping {}", e.0.event_type());
                false
            }
        }
    }

    /// Send an event without waiting.
    ///
    /// Returns true if the event was queued, false if the channel is full or
    /// closed.
    pub fn try_emit(&self, event: WorkflowEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to queue workflow event: {}", e);
                false
            }
        }
    }

    pub async fn confirm_redemption(&self) -> bool {
        self.emit(WorkflowEvent::Operator(OperatorAction::ConfirmRedemption))
            .await
    }

    pub async fn scan_new_ticket(&self) -> bool {
        self.emit(WorkflowEvent::Operator(OperatorAction::ScanNewTicket))
            .await
    }

    pub async fn shutdown(&self) -> bool {
        self.emit(WorkflowEvent::Shutdown).await
    }

    /// Returns true once the controller has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side of the workflow channel, owned by the controller.
#[derive(Debug)]
pub struct WorkflowReceiver {
    rx: mpsc::Receiver<WorkflowEvent>,
}

impl WorkflowReceiver {
    pub(crate) async fn recv(&mut self) -> Option<WorkflowEvent> {
        self.rx.recv().await
    }
}

/// Create the channel connecting scanners, operators and background requests
/// to a controller.
///
/// Returns:
/// - `WorkflowHandle` - clone this into scanners and UI code
/// - `WorkflowReceiver` - hand this to `RedemptionController::new`
pub fn create_workflow_channel(buffer_size: usize) -> (WorkflowHandle, WorkflowReceiver) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (WorkflowHandle::new(tx), WorkflowReceiver { rx })
}
