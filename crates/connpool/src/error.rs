//! Error types for pool operations
use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error raised by handle factories and handle close.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced to callers of [`Pool`](crate::Pool).
#[derive(Error, Debug)]
pub enum Error {
    /// A non-waiting checkout found the pool at its `max_active` limit.
    #[error("Pool '{pool_id}' exhausted: {active}/{max_active} handles active")]
    PoolExhausted {
        /// The pool identifier
        pool_id: String,
        /// Active handles at the time of the check
        active: usize,
        /// Configured limit
        max_active: usize,
    },

    /// Checkout attempted after the pool was closed.
    #[error("Pool '{pool_id}' has been closed")]
    PoolClosed {
        /// The pool identifier
        pool_id: String,
    },

    /// The pool was built without a handle factory.
    #[error("Pool '{pool_id}' has no handle factory configured")]
    FactoryNotConfigured {
        /// The pool identifier
        pool_id: String,
    },

    /// The handle factory failed to produce a handle.
    #[error("Factory for pool '{pool_id}' failed: {source}")]
    Factory {
        /// The pool identifier
        pool_id: String,
        /// The error raised by the factory
        #[source]
        source: BoxError,
    },

    /// The caller cancelled the checkout while it waited for admission.
    #[error("Checkout from pool '{pool_id}' was cancelled")]
    Cancelled {
        /// The pool identifier
        pool_id: String,
    },

    /// The caller's deadline passed while the checkout waited for admission.
    #[error("Checkout from pool '{pool_id}' exceeded its deadline")]
    DeadlineExceeded {
        /// The pool identifier
        pool_id: String,
    },
}

impl Error {
    pub(crate) fn exhausted(pool_id: &str, active: usize, max_active: usize) -> Self {
        Self::PoolExhausted {
            pool_id: pool_id.to_string(),
            active,
            max_active,
        }
    }

    pub(crate) fn closed(pool_id: &str) -> Self {
        Self::PoolClosed {
            pool_id: pool_id.to_string(),
        }
    }

    pub(crate) fn factory(pool_id: &str, source: BoxError) -> Self {
        Self::Factory {
            pool_id: pool_id.to_string(),
            source,
        }
    }

    /// Check if this error is retryable
    ///
    /// Only exhaustion is transient: the same checkout may succeed once a
    /// handle is returned.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }

    /// Get the identifier of the pool that produced this error
    #[must_use]
    pub fn pool_id(&self) -> &str {
        match self {
            Self::PoolExhausted { pool_id, .. }
            | Self::PoolClosed { pool_id }
            | Self::FactoryNotConfigured { pool_id }
            | Self::Factory { pool_id, .. }
            | Self::Cancelled { pool_id }
            | Self::DeadlineExceeded { pool_id } => pool_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_is_retryable() {
        let err = Error::exhausted("db", 4, 4);
        assert!(err.is_retryable());
        assert_eq!(err.pool_id(), "db");
        assert_eq!(err.to_string(), "Pool 'db' exhausted: 4/4 handles active");
    }

    #[test]
    fn terminal_errors_are_not_retryable() {
        assert!(!Error::closed("db").is_retryable());
        assert!(
            !Error::FactoryNotConfigured {
                pool_id: "db".into()
            }
            .is_retryable()
        );
        assert!(!Error::Cancelled { pool_id: "db".into() }.is_retryable());
    }

    #[test]
    fn factory_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::factory("db", Box::new(io));
        let source = std::error::Error::source(&err).expect("source is kept");
        assert_eq!(source.to_string(), "refused");
        assert!(err.to_string().contains("refused"));
    }
}
