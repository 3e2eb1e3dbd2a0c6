/// A decorator was configured with values it cannot work with.
///
/// Raised by constructors only, never recorded into a
/// [`ResultSink`](crate::result::ResultSink).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("number of users must be > 0")]
    NoUsers,

    #[error("number of iterations must be > 0")]
    NoIterations,

    #[error("delay variation must be a finite number of milliseconds, got {0}")]
    InvalidVariation(f64),
}
