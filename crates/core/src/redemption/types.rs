//! Workflow states and the per-attempt session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ticket::{ScannedCode, Ticket};

use super::timer::{PendingResume, ResumeReason};

/// Message shown when a decoded payload is not a ticket code.
pub const INVALID_CODE_MESSAGE: &str = "invalid QR code format";

/// State of a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Scanner active, waiting for a payload. Initial state.
    Scanning,
    /// A lookup request is in flight.
    LookingUp,
    /// A purchased ticket is displayed, waiting for the operator to confirm.
    ReadyToRedeem,
    /// The ticket is used or refunded; nothing to redeem.
    Blocked,
    /// A redemption request is in flight.
    Redeeming,
    /// Redemption succeeded; the scanner resumes after a delay.
    Redeemed,
    /// The last operation failed.
    Error,
}

impl WorkflowState {
    /// Returns true for the only state in which the scanner runs.
    pub fn is_idle(&self) -> bool {
        matches!(self, WorkflowState::Scanning)
    }

    /// Returns true if a backend request is outstanding in this state.
    pub fn has_request_in_flight(&self) -> bool {
        matches!(self, WorkflowState::LookingUp | WorkflowState::Redeeming)
    }

    /// Returns the state type as a string (for logging).
    pub fn state_type(&self) -> &'static str {
        match self {
            WorkflowState::Scanning => "scanning",
            WorkflowState::LookingUp => "looking_up",
            WorkflowState::ReadyToRedeem => "ready_to_redeem",
            WorkflowState::Blocked => "blocked",
            WorkflowState::Redeeming => "redeeming",
            WorkflowState::Redeemed => "redeemed",
            WorkflowState::Error => "error",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.state_type())
    }
}

/// Where the failure behind an `Error` state came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    /// Decoded payload was not a ticket code.
    InvalidCode,
    /// The lookup request faulted.
    Lookup,
    /// The redemption request faulted.
    Redemption,
    /// The scan capability is unavailable.
    Scanner,
}

impl ErrorOrigin {
    /// Whether the scanner resumes on its own after the error delay.
    pub fn auto_resumes(&self) -> bool {
        matches!(self, ErrorOrigin::InvalidCode | ErrorOrigin::Lookup)
    }

    /// Whether the fetched ticket stays displayed.
    pub fn retains_ticket(&self) -> bool {
        matches!(self, ErrorOrigin::Redemption)
    }
}

/// Actions initiated by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorAction {
    /// Redeem the displayed ticket.
    ConfirmRedemption,
    /// Abandon the current ticket or error and scan again.
    ScanNewTicket,
}

/// Ephemeral state of one scan attempt, owned by the controller.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    pub(crate) state: WorkflowState,
    pub(crate) scanned: Option<ScannedCode>,
    pub(crate) ticket: Option<Ticket>,
    pub(crate) error: Option<String>,
    pub(crate) error_origin: Option<ErrorOrigin>,
    pub(crate) success: Option<String>,
    pub(crate) scanner_active: bool,
    pub(crate) pending_resume: Option<PendingResume>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: WorkflowState::Scanning,
            scanned: None,
            ticket: None,
            error: None,
            error_origin: None,
            success: None,
            scanner_active: false,
            pending_resume: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn scanned(&self) -> Option<&ScannedCode> {
        self.scanned.as_ref()
    }

    pub fn ticket(&self) -> Option<&Ticket> {
        self.ticket.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn error_origin(&self) -> Option<ErrorOrigin> {
        self.error_origin
    }

    pub fn success(&self) -> Option<&str> {
        self.success.as_deref()
    }

    pub fn scanner_active(&self) -> bool {
        self.scanner_active
    }

    /// Reason of the scheduled auto-resume, if one is pending.
    pub fn pending_resume(&self) -> Option<ResumeReason> {
        self.pending_resume.as_ref().map(|p| p.reason())
    }

    pub(crate) fn clear_messages(&mut self) {
        self.error = None;
        self.error_origin = None;
        self.success = None;
    }

    /// Drop the displayed ticket and the code it was scanned from.
    pub(crate) fn discard_ticket(&mut self) {
        self.ticket = None;
        self.scanned = None;
    }

    pub(crate) fn cancel_resume(&mut self) {
        if let Some(pending) = self.pending_resume.take() {
            pending.cancel();
        }
    }

    /// Clear ticket, messages and any pending resume. The state itself is
    /// left to the controller.
    pub(crate) fn reset(&mut self) {
        self.cancel_resume();
        self.discard_ticket();
        self.clear_messages();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            state: self.state,
            scanned_code: self.scanned.as_ref().map(|c| c.raw.clone()),
            ticket: self.ticket.clone(),
            error: self.error.clone(),
            error_origin: self.error_origin,
            success: self.success.clone(),
            scanner_active: self.scanner_active,
            pending_resume: self.pending_resume(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a session, handed to UI callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub state: WorkflowState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<Ticket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_origin: Option<ErrorOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    pub scanner_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_resume: Option<ResumeReason>,
}
