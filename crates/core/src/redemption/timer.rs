//! Cancelable delayed resume of the scanner.
//!
//! A scheduled resume posts [`WorkflowEvent::ResumeDue`] with its token once
//! the delay elapses. The session keeps the [`PendingResume`]; dropping or
//! cancelling it aborts the timer, and a due token that no longer matches
//! the session's is ignored by the controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::events::{WorkflowEvent, WorkflowHandle};

/// Identifies one scheduled resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResumeToken(u64);

impl ResumeToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Why the scanner is going to resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeReason {
    /// A scan or lookup failed.
    AfterError,
    /// A ticket was redeemed.
    AfterRedemption,
}

/// A scheduled resume that has not fired yet.
#[derive(Debug)]
pub struct PendingResume {
    token: ResumeToken,
    reason: ResumeReason,
    delay: Duration,
    task: JoinHandle<()>,
}

impl PendingResume {
    pub fn token(&self) -> ResumeToken {
        self.token
    }

    pub fn reason(&self) -> ResumeReason {
        self.reason
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Abort the timer. The resume event will not be sent.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for PendingResume {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Schedules resume events onto the workflow channel.
#[derive(Debug)]
pub struct ResumeTimer {
    next_token: u64,
    handle: WorkflowHandle,
}

impl ResumeTimer {
    pub fn new(handle: WorkflowHandle) -> Self {
        Self {
            next_token: 0,
            handle,
        }
    }

    /// Post `ResumeDue` after `delay`. Must be called within a tokio runtime.
    pub fn schedule(&mut self, delay: Duration, reason: ResumeReason) -> PendingResume {
        self.next_token += 1;
        let token = ResumeToken(self.next_token);
        let handle = self.handle.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.emit(WorkflowEvent::ResumeDue(token)).await;
        });

        PendingResume {
            token,
            reason,
            delay,
            task,
        }
    }
}
