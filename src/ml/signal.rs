// ============================================================
// Layer 5 — Stop Signal
// ============================================================
// Batch-level suspension point for long passes. Every pass
// checks the signal between batches; once tripped (explicitly or
// by deadline) the pass ends with PipelineError::Interrupted.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crate::domain::PipelineError;

#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag:     Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip automatically once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Request a stop; clones share the flag.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `batches` is how many batches the pass completed.
    pub fn check(&self, batches: usize) -> Result<(), PipelineError> {
        if self.is_stopped() {
            tracing::warn!("Stop requested; abandoning pass after {} batches", batches);
            return Err(PipelineError::Interrupted { batches });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let a = StopSignal::new();
        let b = a.clone();
        assert!(a.check(0).is_ok());
        b.stop();
        assert!(matches!(a.check(3), Err(PipelineError::Interrupted { batches: 3 })));
    }

    #[test]
    fn test_elapsed_deadline_trips() {
        let s = StopSignal::new().with_timeout(Duration::ZERO);
        assert!(s.is_stopped());
    }
}
