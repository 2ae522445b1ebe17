//! QR scan capability.
//!
//! A scanner runs its own decode loop. The workflow only toggles it and
//! consumes the [`ScanEvent`]s it pushes onto the workflow channel.

mod gated;

pub use gated::GatedScanner;

use serde::{Deserialize, Serialize};

/// Events pushed by a scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ScanEvent {
    /// A code was decoded; carries the raw text.
    Decoded(String),
    /// A frame was processed without finding a code. Not an error.
    NoDetection,
    /// The scanner cannot run (e.g. camera permission denied).
    CapabilityFault(String),
}

/// Something that can be switched between scanning and suspended.
///
/// Both toggles are idempotent. A suspended scanner delivers no events.
pub trait ScanCapability: Send + Sync {
    fn activate(&self);

    fn suspend(&self);

    fn is_active(&self) -> bool;
}
