use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Counts workers returning from a load episode.
///
/// The barrier is created with the number of workers the episode will
/// dispatch. Each worker calls [`on_completion`](Self::on_completion) exactly
/// once; workers that never got dispatched are accounted for with
/// [`cancel_threads`](Self::cancel_threads). The barrier is reached once the
/// returned count is at least the dispatched count and stays reached from
/// then on.
///
/// A barrier for zero workers is reached from the start.
#[derive(Debug)]
pub struct ThreadBarrier {
    dispatched: usize,
    returned: Mutex<usize>,
    reached: Condvar,
}

impl ThreadBarrier {
    pub fn new(dispatched: usize) -> Self {
        Self {
            dispatched,
            returned: Mutex::new(0),
            reached: Condvar::new(),
        }
    }

    fn returned(&self) -> MutexGuard<'_, usize> {
        self.returned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add(&self, count: usize) {
        let mut returned = self.returned();
        *returned = returned.saturating_add(count);
        if *returned >= self.dispatched {
            self.reached.notify_all();
        }
    }

    /// Called by a worker once it returned. Not idempotent.
    pub fn on_completion(&self) {
        self.add(1);
    }

    /// Account for `count` workers that will never be dispatched.
    pub fn cancel_threads(&self, count: usize) {
        self.add(count);
    }

    pub fn is_reached(&self) -> bool {
        *self.returned() >= self.dispatched
    }

    pub fn dispatched_count(&self) -> usize {
        self.dispatched
    }

    pub fn returned_count(&self) -> usize {
        *self.returned()
    }

    /// Block until the barrier is reached.
    pub fn wait(&self) {
        let returned = self.returned();
        let _reached = self
            .reached
            .wait_while(returned, |returned| *returned < self.dispatched)
            .unwrap_or_else(PoisonError::into_inner);
    }
}
