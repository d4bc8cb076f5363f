//! Cooperative stream cancellation.
//!
//! Each stream gets its own `StopSignal`. Clones share one flag, so the
//! handle kept by the stop command and the one polled by the worker loop
//! observe the same state. Nothing re-arms a signal implicitly: a stop
//! issued before the loop starts is still honoured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Re-arm the signal for reuse.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
