use std::{fmt, sync::Arc};

use crate::{
    barrier::ThreadBarrier,
    group::ThreadedTestGroup,
    run::TestRun,
    test::Test,
};

/// Runs a decorated test on a dedicated worker thread.
///
/// Every [`run`](Test::run) starts exactly one new member of the bound
/// [`ThreadedTestGroup`] and returns right away. The worker runs the decorated
/// test and then signals the [`ThreadBarrier`] exactly once, whether the test
/// passed, recorded a failure or panicked. The signal is given when the
/// worker's [`TestRun`] is dropped, after its other exit hooks ran.
pub struct ThreadedTest {
    test: Arc<dyn Test>,
    group: ThreadedTestGroup,
    barrier: Arc<ThreadBarrier>,
}

impl ThreadedTest {
    pub fn new(test: Arc<dyn Test>, group: ThreadedTestGroup, barrier: Arc<ThreadBarrier>) -> Self {
        Self {
            test,
            group,
            barrier,
        }
    }

    pub fn group(&self) -> &ThreadedTestGroup {
        &self.group
    }

    pub fn barrier(&self) -> &ThreadBarrier {
        &self.barrier
    }
}

impl fmt::Display for ThreadedTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadedTest: {}", self.test)
    }
}

impl Test for ThreadedTest {
    fn count_test_cases(&self) -> usize {
        self.test.count_test_cases()
    }

    fn run(&self, run: &TestRun) {
        let worker = run.join_group(&self.group);
        let worker_id = worker.worker();
        let test = Arc::clone(&self.test);
        let group = self.group.clone();
        let barrier = Arc::clone(&self.barrier);

        let spawned = self.group.spawn(worker, move |run| {
            // Registered first so it runs after every other exit hook.
            run.on_worker_exit(move || barrier.on_completion());
            group.run_member(run, |run| test.run(run));
        });

        match spawned {
            Ok(_) => tracing::trace!(worker = %worker_id, "worker dispatched"),
            Err(err) => {
                tracing::error!(worker = %worker_id, %err, "failed to start worker thread");
                run.result().add_error(
                    &self.test.to_string(),
                    format!("failed to start worker thread: {err}"),
                );
                self.barrier.on_completion();
            }
        }
    }
}
