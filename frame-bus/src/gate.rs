use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, MutexGuard, PoisonError};

/// One-shot wakeup for the thread driving a pipeline.
///
/// The waiter always re-checks its condition under the guarded mutex, so an
/// early or spurious wake never releases it.
#[derive(Default)]
pub struct Gate {
    cond: Condvar,
    opened: AtomicBool,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes the waiter. Returns false if the gate was already opened.
    pub fn open(&self) -> bool {
        if self.opened.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cond.notify_all();
        true
    }

    /// Blocks until `done` holds for the guarded state.
    pub fn wait<'a, T>(
        &self,
        guard: MutexGuard<'a, T>,
        mut done: impl FnMut(&T) -> bool,
    ) -> MutexGuard<'a, T> {
        self.cond
            .wait_while(guard, |state| !done(state))
            .unwrap_or_else(PoisonError::into_inner)
    }
}
