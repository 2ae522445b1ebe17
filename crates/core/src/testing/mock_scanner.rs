//! Mock scan capability for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::scanner::ScanCapability;

/// Records how the workflow toggles the scanner.
///
/// Scan events are pushed by tests straight onto the workflow channel; this
/// mock only tracks the activation flag so tests can assert on it.
#[derive(Debug, Default)]
pub struct MockScanner {
    active: AtomicBool,
    activations: AtomicUsize,
    suspensions: AtomicUsize,
}

impl MockScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of suspended-to-active switches.
    pub fn activation_count(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// Number of active-to-suspended switches.
    pub fn suspension_count(&self) -> usize {
        self.suspensions.load(Ordering::SeqCst)
    }
}

impl ScanCapability for MockScanner {
    fn activate(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            self.activations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn suspend(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.suspensions.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
