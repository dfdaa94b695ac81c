use thiserror::Error;

/// How a caller should react to a given error, mirroring the
/// "Surfaced / Recovered locally / terminates the pipeline" distinctions
/// drawn out in the error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

/// The crate-wide error type. Every fallible public operation returns
/// `Result<T, NavError>` rather than panicking on malformed input.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("invalid argument `{field}`: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("{component} has not been initialized")]
    NotInitialized { component: String },

    #[error("{component} exceeded its limit ({limit}, got {actual})")]
    LimitExceeded {
        component: String,
        limit: usize,
        actual: usize,
    },

    #[error("{component} timed out after {elapsed_ms}ms")]
    Timeout {
        component: String,
        elapsed_ms: u64,
    },

    #[error("no route found from {from} to {to}")]
    NoRoute { from: String, to: String },

    #[error("{component} queue dropped a unit of work (queue_len={queue_len})")]
    QueueDropped { component: String, queue_len: usize },

    #[error("transient failure in {component}: {message}")]
    TransientProcessingError { component: String, message: String },

    #[error("fatal failure in {component}: {message}")]
    Fatal { component: String, message: String },

    #[error("{component} was cancelled")]
    Cancelled { component: String },
}

impl NavError {
    pub fn severity(&self) -> Severity {
        match self {
            NavError::InvalidArgument { .. } => Severity::Error,
            NavError::NotInitialized { .. } => Severity::Error,
            NavError::LimitExceeded { .. } => Severity::Warn,
            NavError::Timeout { .. } => Severity::Warn,
            NavError::NoRoute { .. } => Severity::Info,
            NavError::QueueDropped { .. } => Severity::Warn,
            NavError::TransientProcessingError { .. } => Severity::Warn,
            NavError::Fatal { .. } => Severity::Fatal,
            NavError::Cancelled { .. } => Severity::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors_rank_above_warnings() {
        let fatal = NavError::Fatal {
            component: "graph".into(),
            message: "corrupt index".into(),
        };
        let warn = NavError::Timeout {
            component: "cv_pipeline".into(),
            elapsed_ms: 500,
        };
        assert!(fatal.severity() > warn.severity());
    }

    #[test]
    fn test_no_route_is_informational() {
        let err = NavError::NoRoute {
            from: "a".into(),
            to: "b".into(),
        };
        assert_eq!(err.severity(), Severity::Info);
    }
}
