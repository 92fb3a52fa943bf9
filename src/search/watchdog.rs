//! Per-read watchdog cancellation.
//!
//! A per-read watchdog may set a cancel flag checked at the top of each
//! state transition and at every 2^k-th BPM column; on cancel the read is
//! emitted as unmapped with reason = timeout. Modeled as an
//! `Arc<AtomicBool>`, the idiomatic analogue of a checked flag polled in a
//! tight loop, shared between the worker processing the read and whatever
//! thread (or timer) owns the watchdog.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag. Cloning shares the same underlying flag,
/// so a watchdog thread holding one clone can cancel a read a worker thread
/// is processing via another clone.
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for CancelToken {
    fn default() -> CancelToken {
        CancelToken::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn cancelling_a_clone_is_visible_on_the_original() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
