//! QR-driven ticket redemption workflow.
//!
//! A [`RedemptionController`] owns one scan session at a time and walks it
//! through the states in [`WorkflowState`]. Everything it reacts to arrives
//! as a [`WorkflowEvent`] on a bounded channel:
//!
//! ```text
//! scanner ──┐
//! operator ─┼──> WorkflowHandle ──> RedemptionController ──> TicketBackend
//! timers ───┤                              │
//! requests ─┘ <────── completions ─────────┘
//! ```

mod controller;
mod events;
mod timer;
mod types;

pub use crate::config::RedemptionConfig;
pub use controller::{RedemptionController, SessionUpdateCallback};
pub use events::{
    create_workflow_channel, RequestId, WorkflowEvent, WorkflowHandle, WorkflowReceiver,
};
pub use timer::{PendingResume, ResumeReason, ResumeTimer, ResumeToken};
pub use types::{
    ErrorOrigin, OperatorAction, Session, SessionSnapshot, WorkflowState, INVALID_CODE_MESSAGE,
};
