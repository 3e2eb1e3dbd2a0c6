//! The explicit per-worker context handed to every [`Test::run`](crate::test::Test::run).
//!
//! Instead of relying on implicit thread identity, each worker carries a
//! [`TestRun`]: the shared [`ResultSink`], a [`WorkerId`] that is unique for the
//! worker, and its membership in a [`ThreadedTestGroup`] (if it was started by
//! one). Tests that want to be interruptible or that start helper threads of
//! their own do so through this context, so the group can account for them.

use std::{
    fmt,
    io,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, TryRecvError};

use crate::{group::ThreadedTestGroup, outcome::Interrupted, result::ResultSink};

/// Identity of one worker.
///
/// Every thread started through this crate gets a fresh id. Clones of a
/// [`TestRun`] keep the id they were cloned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "perfkit-worker-{}", self.0)
    }
}

type ExitHook = Box<dyn FnOnce() + Send>;

/// Lifetime of one worker, shared by every clone of its [`TestRun`].
///
/// Exit hooks run once the last clone is dropped, latest first.
#[derive(Default)]
struct WorkerScope {
    on_exit: Mutex<Vec<ExitHook>>,
}

impl Drop for WorkerScope {
    fn drop(&mut self) {
        let hooks = std::mem::take(
            self.on_exit
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for hook in hooks.into_iter().rev() {
            hook();
        }
    }
}

impl fmt::Debug for WorkerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks = self
            .on_exit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("WorkerScope").field("on_exit", &hooks).finish()
    }
}

#[derive(Debug, Clone)]
pub struct TestRun {
    result: ResultSink,
    worker: WorkerId,
    scope: Arc<WorkerScope>,
    group: Option<ThreadedTestGroup>,
    interrupt: Receiver<()>,
}

impl TestRun {
    /// Context for the calling thread, outside of any group.
    pub fn new(result: ResultSink) -> Self {
        Self {
            result,
            worker: WorkerId::next(),
            scope: Arc::default(),
            group: None,
            interrupt: crossbeam_channel::never(),
        }
    }

    pub fn result(&self) -> &ResultSink {
        &self.result
    }

    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// The innermost group this worker is a member of.
    pub fn group(&self) -> Option<&ThreadedTestGroup> {
        self.group.as_ref()
    }

    /// Run `f` once this worker finished.
    ///
    /// A worker is finished when every clone of its `TestRun` was dropped,
    /// which for threads started by this crate is when the thread returns.
    /// Hooks run in reverse order of registration.
    pub fn on_worker_exit(&self, f: impl FnOnce() + Send + 'static) {
        self.scope
            .on_exit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(f));
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self.interrupt.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub fn check_interrupted(&self) -> Result<(), Interrupted> {
        match self.is_interrupted() {
            true => Err(Interrupted),
            false => Ok(()),
        }
    }

    /// Sleep for `duration`, waking up early if the worker gets interrupted.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        // Nothing is ever sent on the channel, `recv` only returns once the
        // sender was dropped by an interrupt.
        crossbeam_channel::select! {
            recv(self.interrupt) -> _ => Err(Interrupted),
            default(duration) => Ok(()),
        }
    }

    /// Start a helper thread that belongs to this worker's group.
    ///
    /// The thread gets a fresh [`WorkerId`]. Inside a group it counts as an
    /// active member until it returns, sees the group's interruption and has
    /// escaping panics recorded against the group's test. Outside of a group
    /// it is a plain thread.
    pub fn spawn<F>(&self, f: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce(&TestRun) + Send + 'static,
    {
        let run = self.fork();
        match &self.group {
            Some(group) => group.spawn(run, f),
            None => thread::Builder::new()
                .name(run.worker.to_string())
                .spawn(move || f(&run)),
        }
    }

    /// Same sink and group, new worker identity.
    pub(crate) fn fork(&self) -> Self {
        Self {
            worker: WorkerId::next(),
            scope: Arc::default(),
            ..self.clone()
        }
    }

    /// New worker identity as a member of `group`.
    pub(crate) fn join_group(&self, group: &ThreadedTestGroup) -> Self {
        Self {
            result: self.result.clone(),
            worker: WorkerId::next(),
            scope: Arc::default(),
            group: Some(group.clone()),
            interrupt: group.interrupt_signal(),
        }
    }

    /// Same worker, reporting into a different sink handle.
    pub(crate) fn with_result(&self, result: ResultSink) -> Self {
        Self {
            result,
            ..self.clone()
        }
    }
}
