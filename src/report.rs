//! Where elapsed-time diagnostics go.
//!
//! A [`TimedTest`](crate::timed::TimedTest) reports how long its decorated
//! test took after every run. The line looks like
//! `TimedTest (WAITING): checkout: 1003 ms`. By default it goes to stdout;
//! tests capture it with a [`WriteReporter`].

use std::{
    io::{self, Write},
    sync::{Mutex, PoisonError},
    time::Duration,
};

/// Receives one elapsed-time line per timed run.
pub trait ElapsedReporter: Send + Sync {
    fn report(&self, test: &str, elapsed: Duration);
}

/// Prints elapsed times to stdout.
#[derive(Debug, Default, Clone)]
pub struct StdoutReporter;

impl ElapsedReporter for StdoutReporter {
    fn report(&self, test: &str, elapsed: Duration) {
        let mut stdout = io::stdout().lock();
        if let Err(err) = writeln!(stdout, "{test}: {} ms", elapsed.as_millis())
            .and_then(|_| stdout.flush())
        {
            tracing::warn!(%err, "could not print elapsed time");
        }
    }
}

/// Writes elapsed times into any [`io::Write`].
#[derive(Debug, Default)]
pub struct WriteReporter<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriteReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Access the underlying writer.
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut writer)
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> ElapsedReporter for WriteReporter<W> {
    fn report(&self, test: &str, elapsed: Duration) {
        let written = self.with_writer(|writer| {
            writeln!(writer, "{test}: {} ms", elapsed.as_millis()).and_then(|_| writer.flush())
        });
        if let Err(err) = written {
            tracing::warn!(%err, "could not write elapsed time");
        }
    }
}
