//! Test classes: a fixture type with named test methods.
//!
//! A [`TestClass`] is the shape a [`TestFactory`](crate::factory::TestFactory)
//! builds fresh instances from. Each [`TestCase`] pairs one instance with one
//! [`TestMethod`] and brackets the method with the class's
//! [`set_up`](TestClass::set_up) and [`tear_down`](TestClass::tear_down).
//!
//! Fixture state lives in the instance and is shared by everything that runs
//! that instance. Run one `TestCase` from several threads at once and they
//! will step on each other's fixture; a factory gives each worker its own.
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! use perfkit::{
//!     case::{TestClass, TestMethod},
//!     run::TestRun,
//!     test::{BoxError, TestResult},
//!     test_methods,
//! };
//!
//! #[derive(Default)]
//! struct Checkout {
//!     items: AtomicUsize,
//! }
//!
//! impl Checkout {
//!     fn test_add_item(&self, _: &TestRun) -> TestResult {
//!         self.items.fetch_add(1, Ordering::SeqCst);
//!         assert_eq!(self.items.load(Ordering::SeqCst), 1);
//!         ().into()
//!     }
//! }
//!
//! impl TestClass for Checkout {
//!     fn test_methods() -> Vec<TestMethod<Self>> {
//!         test_methods![Checkout: test_add_item]
//!     }
//!
//!     fn construct() -> Result<Self, BoxError> {
//!         Ok(Self::default())
//!     }
//!
//!     fn tear_down(&self) {
//!         self.items.store(0, Ordering::SeqCst);
//!     }
//! }
//! ```

use std::{
    any,
    borrow::Cow,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind, resume_unwind},
    sync::Arc,
};

use crate::{
    outcome::{AssertionFailure, payload_as_string},
    run::TestRun,
    test::{BoxError, Test, TestFn, TestResult, run_protected},
};

/// A fixture type with named test methods.
///
/// Test methods report a failure by panicking with an [`AssertionFailure`]
/// (see [`std::panic::panic_any`]) or by returning one as their error. A
/// plain `assert!`, `assert_eq!` or `assert_ne!` also counts as a failure,
/// but only without a custom message: `assert!(ok, "cart is empty")` panics
/// with just the custom message and is recorded as an error. Return
/// `Err(AssertionFailure::new("cart is empty"))` instead to keep it a
/// failure. Every other panic or error is recorded as an error.
pub trait TestClass: Sized + Send + Sync + 'static {
    /// Name used in test descriptions. Defaults to the unqualified type name.
    fn class_name() -> Cow<'static, str> {
        let name = any::type_name::<Self>();
        Cow::Borrowed(name.rsplit("::").next().unwrap_or(name))
    }

    fn test_methods() -> Vec<TestMethod<Self>>;

    /// Create a fresh instance. Errors and panics become failing warning tests.
    fn construct() -> Result<Self, BoxError>;

    fn set_up(&self) {}

    fn tear_down(&self) {}
}

type MethodFn<C> = dyn Fn(&C, &TestRun) -> TestResult + Send + Sync;

/// A named test method of a [`TestClass`].
pub struct TestMethod<C> {
    name: Cow<'static, str>,
    func: Arc<MethodFn<C>>,
}

impl<C> TestMethod<C> {
    pub fn new<F, T>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(&C, &TestRun) -> T + Send + Sync + 'static,
        T: Into<TestResult>,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |instance, run| func(instance, run).into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C> Clone for TestMethod<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<C> fmt::Debug for TestMethod<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TestMethod").field(&self.name).finish()
    }
}

/// List test methods of a class by name.
///
/// `test_methods![MyClass: test_a, test_b]` expands to a `Vec<TestMethod<MyClass>>`.
#[macro_export]
macro_rules! test_methods {
    ($class:ty: $($method:ident),* $(,)?) => {
        ::std::vec![$($crate::case::TestMethod::new(
            ::std::stringify!($method),
            <$class>::$method,
        )),*]
    };
}

/// One test method bound to one instance of its class.
pub struct TestCase<C> {
    instance: C,
    method: TestMethod<C>,
}

impl<C: TestClass> TestCase<C> {
    pub fn new(instance: C, method: TestMethod<C>) -> Self {
        Self { instance, method }
    }

    pub fn name(&self) -> &str {
        self.method.name()
    }

    pub fn instance(&self) -> &C {
        &self.instance
    }
}

impl<C: TestClass> fmt::Display for TestCase<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.method.name(), C::class_name())
    }
}

impl<C: TestClass> Test for TestCase<C> {
    fn count_test_cases(&self) -> usize {
        1
    }

    fn run(&self, run: &TestRun) {
        run_protected(self, run, || {
            self.instance.set_up();
            let outcome = catch_unwind(AssertUnwindSafe(|| (self.method.func)(&self.instance, run)));
            self.instance.tear_down();
            match outcome {
                Ok(test_result) => test_result,
                Err(payload) => resume_unwind(payload),
            }
        });
    }
}

/// A test that always fails with `message`.
///
/// Stands in for tests that could not be built.
pub fn warning(message: impl Into<String>) -> Arc<dyn Test> {
    let message = message.into();
    Arc::new(TestFn::new("warning", move |_| {
        Err::<(), _>(AssertionFailure::new(message.clone()))
    }))
}

/// Build a test case for `method` on a fresh instance of `C`.
pub(crate) fn method_test<C: TestClass>(method: &TestMethod<C>) -> Arc<dyn Test> {
    match catch_unwind(C::construct) {
        Ok(Ok(instance)) => Arc::new(TestCase::new(instance, method.clone())),
        Ok(Err(err)) => {
            tracing::debug!(method = method.name(), %err, "test class construction failed");
            warning(format!(
                "Exception in constructor: {} ({err})",
                method.name()
            ))
        }
        Err(payload) => warning(format!(
            "Exception in constructor: {} ({})",
            method.name(),
            payload_as_string(payload)
        )),
    }
}
