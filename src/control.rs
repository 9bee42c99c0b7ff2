//! Cooperative interruption of a training run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flags checked at epoch boundaries in every training phase.
///
/// `pause` hands control to the registered pause hook and then resumes with
/// refreshed derived parameters; `abort` ends the trial early with an
/// `Aborted` status propagated through the phase results. Both are safe to
/// set from another thread or a signal handler.
#[derive(Debug, Clone, Default)]
pub struct TrainControl {
    inner: Arc<Flags>,
}

#[derive(Debug, Default)]
struct Flags {
    pause: AtomicBool,
    abort: AtomicBool,
}

impl TrainControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_pause(&self) {
        self.inner.pause.store(true, Ordering::SeqCst);
    }

    pub fn request_abort(&self) {
        self.inner.abort.store(true, Ordering::SeqCst);
    }

    /// Clear both flags, e.g. before reusing the control for another trial.
    pub fn clear(&self) {
        self.inner.pause.store(false, Ordering::SeqCst);
        self.inner.abort.store(false, Ordering::SeqCst);
    }

    /// Consume a pending pause request.
    pub(crate) fn take_pause(&self) -> bool {
        self.inner.pause.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn abort_requested(&self) -> bool {
        self.inner.abort.load(Ordering::SeqCst)
    }
}
