use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Marker returned from a checkpoint once cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("scrape interrupted")]
pub struct Interrupted;

/// Cooperative cancellation flag shared between the UI and one worker.
///
/// The worker only observes it at checkpoints; a provider call that is
/// already in flight runs to completion first.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}
