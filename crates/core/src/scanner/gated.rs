use std::sync::atomic::{AtomicBool, Ordering};

use tracing::trace;

use crate::redemption::{WorkflowEvent, WorkflowHandle};

use super::{ScanCapability, ScanEvent};

/// Scan capability for decoders that push text on their own, such as
/// keyboard-wedge scanners or a line reader.
///
/// Events fed while suspended are dropped, so the controller never sees a
/// decode outside `Scanning`. Starts suspended.
#[derive(Debug)]
pub struct GatedScanner {
    active: AtomicBool,
    handle: WorkflowHandle,
}

impl GatedScanner {
    pub fn new(handle: WorkflowHandle) -> Self {
        Self {
            active: AtomicBool::new(false),
            handle,
        }
    }

    /// Deliver an event if the scanner is active.
    ///
    /// Returns whether the event was delivered.
    pub async fn feed(&self, event: ScanEvent) -> bool {
        if !self.is_active() {
            trace!("Scanner suspended, dropping {:?}", event);
            return false;
        }
        self.handle.emit(WorkflowEvent::Scan(event)).await
    }

    /// Blocking variant of [`feed`](Self::feed) for reader threads.
    pub fn feed_blocking(&self, event: ScanEvent) -> bool {
        if !self.is_active() {
            trace!("Scanner suspended, dropping {:?}", event);
            return false;
        }
        self.handle.emit_blocking(WorkflowEvent::Scan(event))
    }
}

impl ScanCapability for GatedScanner {
    fn activate(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            trace!("Scanner activated");
        }
    }

    fn suspend(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            trace!("Scanner suspended");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
