//! Cooperative pause/cancel flags shared between controller and engine

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flags set from the controller's context and polled by the engine
/// at chunk boundaries.
#[derive(Debug, Clone, Default)]
pub struct TransferSignals {
    paused: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl TransferSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
