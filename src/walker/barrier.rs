//! Join barrier over a dynamically growing set of asynchronous branches.
//!
//! Every branch is represented by a [`BranchGuard`] obtained from
//! [`JoinBarrier::enter`] *before* the work it guards is started. The guard
//! reports back exactly once: explicitly through [`BranchGuard::complete`] or
//! [`BranchGuard::fail`], or implicitly when it is dropped (including while a
//! branch panics). The barrier resolves the instant the outstanding count
//! goes from one to zero, or as soon as any branch fails.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::WalkError;

/// Counters observed when the barrier resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarrierStats {
    /// Branches entered (increments)
    pub entered: usize,
    /// Branches that reported back (decrements)
    pub completed: usize,
}

#[derive(Debug)]
struct Inner {
    outstanding: AtomicUsize,
    entered: AtomicUsize,
    completed: AtomicUsize,
    aborted: AtomicBool,
    fired: AtomicBool,
    first_error: Mutex<Option<anyhow::Error>>,
    done_tx: watch::Sender<bool>,
}

/// Counting join primitive; cheap to clone, all clones share one counter
#[derive(Debug, Clone)]
pub struct JoinBarrier {
    inner: Arc<Inner>,
}

impl JoinBarrier {
    pub fn new() -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                outstanding: AtomicUsize::new(0),
                entered: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                aborted: AtomicBool::new(false),
                fired: AtomicBool::new(false),
                first_error: Mutex::new(None),
                done_tx,
            }),
        }
    }

    /// Register a new branch. Must be called before the guarded work starts.
    pub fn enter(&self) -> BranchGuard {
        self.inner.entered.fetch_add(1, Ordering::AcqRel);
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        BranchGuard {
            barrier: self.clone(),
            reported: false,
        }
    }

    /// Branches started but not yet reported back
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// True once a branch failed; pending branches should skip their work
    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::Acquire)
    }

    /// True once the completion signal has been sent
    pub fn has_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> BarrierStats {
        BarrierStats {
            entered: self.inner.entered.load(Ordering::Acquire),
            completed: self.inner.completed.load(Ordering::Acquire),
        }
    }

    /// Wait for barrier-zero, or for the first branch failure
    pub async fn wait(&self) -> anyhow::Result<BarrierStats> {
        let mut done_rx = self.inner.done_tx.subscribe();
        // The sender lives in `inner`, which `self` keeps alive
        let _ = done_rx.wait_for(|done| *done).await;

        let error = self
            .inner
            .first_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match error {
            Some(error) => Err(error),
            None => Ok(self.stats()),
        }
    }

    fn leave(&self) {
        self.inner.completed.fetch_add(1, Ordering::AcqRel);
        let previous = self.inner.outstanding.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "join barrier decremented below zero");
        if previous == 1 {
            self.fire();
        }
    }

    fn record_failure(&self, error: anyhow::Error) {
        {
            let mut slot = self
                .inner
                .first_error
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if slot.is_none() {
                *slot = Some(error);
            } else {
                tracing::debug!("Additional branch failure after abort: {:#}", error);
            }
        }
        self.inner.aborted.store(true, Ordering::Release);
        self.fire();
    }

    fn fire(&self) {
        if self
            .inner
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.inner.done_tx.send_replace(true);
        }
    }
}

impl Default for JoinBarrier {
    fn default() -> Self {
        Self::new()
    }
}

/// One outstanding branch of a [`JoinBarrier`]
#[derive(Debug)]
#[must_use = "dropping a guard immediately reports the branch as complete"]
pub struct BranchGuard {
    barrier: JoinBarrier,
    reported: bool,
}

impl BranchGuard {
    /// Report successful completion
    pub fn complete(mut self) {
        self.reported = true;
        self.barrier.leave();
    }

    /// Report failure; aborts the traversal
    pub fn fail(mut self, error: anyhow::Error) {
        self.reported = true;
        self.barrier.record_failure(error);
        self.barrier.leave();
    }
}

impl Drop for BranchGuard {
    fn drop(&mut self) {
        if self.reported {
            return;
        }
        if std::thread::panicking() {
            self.barrier
                .record_failure(WalkError::BranchPanicked.into());
        }
        self.barrier.leave();
    }
}
