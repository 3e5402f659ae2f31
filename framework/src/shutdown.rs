//! Cooperative shutdown for the long-running loops
//!
//! Every loop checks the token at its suspension points and returns once a
//! stop has been requested. Firmware never requests one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Suspend for `duration`, then report whether the caller should keep running
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_requested() {
            return false;
        }
        thread::sleep(duration);
        !self.is_requested()
    }
}
