//! Worker registry for one load episode.
//!
//! A [`ThreadedTestGroup`] knows every thread that belongs to an episode:
//! the virtual users a [`ThreadedTest`](crate::threaded::ThreadedTest)
//! dispatches, helper threads those users start through
//! [`TestRun::spawn`], and the members of groups nested inside them.
//!
//! It is responsible for three things:
//! - counting active members, so an atomic [`LoadTest`](crate::load::LoadTest)
//!   can wait for all of them,
//! - turning a panic that escapes a member into a failure or error of the
//!   outer test, recorded in the group's [`ResultSink`],
//! - cooperative interruption. Members are never killed. They observe the
//!   interruption through [`TestRun::is_interrupted`] or [`TestRun::sleep`].

use std::{
    any::Any,
    fmt, io,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak},
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender, TryRecvError};

use crate::{outcome::Fault, result::ResultSink, run::TestRun};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner {
    test: String,
    result: ResultSink,
    parent: Option<ThreadedTestGroup>,
    active: Mutex<usize>,
    idle: Condvar,
    // Dropping the sender disconnects every receiver, which is the interrupt.
    interrupt_tx: Mutex<Option<Sender<()>>>,
    interrupt_rx: Receiver<()>,
    children: Mutex<Vec<Weak<Inner>>>,
    uncaught: Mutex<()>,
}

#[derive(Clone)]
pub struct ThreadedTestGroup(Arc<Inner>);

impl ThreadedTestGroup {
    /// Create a group recording uncaught failures against `test` into `result`.
    pub fn new(test: impl Into<String>, result: ResultSink) -> Self {
        Self::nested(test, result, None)
    }

    /// Create a group whose members also count as members of `parent`.
    ///
    /// Interrupting the parent interrupts this group as well.
    pub fn nested(
        test: impl Into<String>,
        result: ResultSink,
        parent: Option<&ThreadedTestGroup>,
    ) -> Self {
        let (interrupt_tx, interrupt_rx) = crossbeam_channel::bounded(0);
        let group = Self(Arc::new(Inner {
            test: test.into(),
            result,
            parent: parent.cloned(),
            active: Mutex::new(0),
            idle: Condvar::new(),
            interrupt_tx: Mutex::new(Some(interrupt_tx)),
            interrupt_rx,
            children: Mutex::new(Vec::new()),
            uncaught: Mutex::new(()),
        }));

        if let Some(parent) = parent {
            lock(&parent.0.children).push(Arc::downgrade(&group.0));
            // The parent drops its sender before visiting its children, so a
            // child registered too late still notices here.
            if parent.is_interrupted() {
                group.interrupt();
            }
        }

        group
    }

    /// Description of the test failures are attributed to.
    pub fn test(&self) -> &str {
        &self.0.test
    }

    pub fn result(&self) -> &ResultSink {
        &self.0.result
    }

    /// Number of member threads still running, nested groups included.
    pub fn active_count(&self) -> usize {
        *lock(&self.0.active)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(
            self.0.interrupt_rx.try_recv(),
            Err(TryRecvError::Disconnected)
        )
    }

    pub(crate) fn interrupt_signal(&self) -> Receiver<()> {
        self.0.interrupt_rx.clone()
    }

    /// Interrupt all members of this group and of every nested group.
    pub fn interrupt(&self) {
        if let Some(sender) = lock(&self.0.interrupt_tx).take() {
            tracing::debug!(test = %self.0.test, "interrupting worker group");
            drop(sender);
        }

        let children: Vec<_> = lock(&self.0.children)
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for child in children {
            ThreadedTestGroup(child).interrupt();
        }
    }

    /// Handle a panic that escaped one of the members.
    ///
    /// [`Interrupted`](crate::outcome::Interrupted) payloads are ignored.
    /// Anything else is recorded against the group's test, as a failure for
    /// assertion-style payloads and as an error otherwise, and then the whole
    /// group gets interrupted.
    pub fn uncaught_exception(&self, payload: Box<dyn Any + Send + 'static>) {
        let _serial = lock(&self.0.uncaught);

        let Some(fault) = Fault::from_panic(payload) else {
            tracing::trace!(test = %self.0.test, "worker left after interruption");
            return;
        };

        tracing::warn!(
            test = %self.0.test,
            message = fault.message(),
            "uncaught failure in worker thread"
        );
        self.0.result.add_fault(&self.0.test, fault);
        self.interrupt();
    }

    /// Block until no member thread is running anymore.
    pub fn wait_for_idle(&self) {
        let active = lock(&self.0.active);
        let _idle = self
            .0
            .idle
            .wait_while(active, |active| *active > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Tear the group down.
    ///
    /// Still running members get interrupted and the group is detached from
    /// its parent. Never fails.
    pub fn destroy(&self) {
        self.interrupt();
        if let Some(parent) = &self.0.parent {
            let this = Arc::as_ptr(&self.0);
            lock(&parent.0.children)
                .retain(|child| child.strong_count() > 0 && child.as_ptr() != this);
        }
    }

    /// Register one more active member, here and in every ancestor.
    pub(crate) fn enter(&self) -> Membership {
        let mut groups = Vec::new();
        let mut current = Some(self.clone());
        while let Some(group) = current {
            *lock(&group.0.active) += 1;
            current = group.0.parent.clone();
            groups.push(group);
        }
        Membership(groups)
    }

    /// Run `f` as a member body, routing an escaping panic through the group.
    pub(crate) fn run_member<F>(&self, run: &TestRun, f: F)
    where
        F: FnOnce(&TestRun),
    {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(run))) {
            self.uncaught_exception(payload);
        }
    }

    /// Start a member thread running `f`.
    ///
    /// The thread counts as active from before this call returns until `f`
    /// finished, panicked or the spawn failed.
    pub(crate) fn spawn<F>(&self, run: TestRun, f: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce(&TestRun) + Send + 'static,
    {
        let membership = self.enter();
        let group = self.clone();
        thread::Builder::new()
            .name(run.worker().to_string())
            .spawn(move || {
                let _membership = membership;
                group.run_member(&run, f);
                // Worker exit hooks run before the group can become idle.
                drop(run);
            })
    }
}

impl fmt::Debug for ThreadedTestGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadedTestGroup")
            .field("test", &self.0.test)
            .field("active", &self.active_count())
            .field("interrupted", &self.is_interrupted())
            .field("nested", &self.0.parent.is_some())
            .finish()
    }
}

/// Active membership of one thread, released on drop.
pub(crate) struct Membership(Vec<ThreadedTestGroup>);

impl Drop for Membership {
    fn drop(&mut self) {
        for group in &self.0 {
            let mut active = lock(&group.0.active);
            *active = active.saturating_sub(1);
            if *active == 0 {
                group.0.idle.notify_all();
            }
        }
    }
}
