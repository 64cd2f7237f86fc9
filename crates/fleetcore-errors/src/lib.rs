//! Error taxonomy for the action execution engine.
//!
//! Individual error structs carry the data needed to format a user-facing
//! message; [`EngineError`] is the umbrella enum propagated across crate
//! boundaries and classified by [`EngineError::retry_class`].

use thiserror::Error;

/// Requested entity does not exist (or is not visible to the caller's project).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} '{id}' could not be found")]
pub struct NotFound {
    pub kind: &'static str,
    pub id: String,
}

impl NotFound {
    pub fn new(kind: &'static str, id: impl Into<String>) -> Self {
        NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// A short-id prefix resolved to more than one row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("multiple {kind} rows match id prefix '{prefix}'")]
pub struct MultipleChoices {
    pub kind: &'static str,
    pub prefix: String,
}

impl MultipleChoices {
    pub fn new(kind: &'static str, prefix: impl Into<String>) -> Self {
        MultipleChoices {
            kind,
            prefix: prefix.into(),
        }
    }
}

/// A caller-supplied parameter failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid parameter '{parameter}': {reason}")]
pub struct InvalidParameter {
    pub parameter: String,
    pub reason: String,
}

impl InvalidParameter {
    pub fn new(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        InvalidParameter {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

/// A malformed request that cannot be interpreted at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("bad request: {reason}")]
pub struct BadRequest {
    pub reason: String,
}

impl BadRequest {
    pub fn new(reason: impl Into<String>) -> Self {
        BadRequest {
            reason: reason.into(),
        }
    }
}

/// A profile/policy could not be deleted because a live cluster or node still
/// references it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} '{id}' is still in use and cannot be removed")]
pub struct ResourceBusy {
    pub kind: &'static str,
    pub id: String,
}

impl ResourceBusy {
    pub fn new(kind: &'static str, id: impl Into<String>) -> Self {
        ResourceBusy {
            kind,
            id: id.into(),
        }
    }
}

/// A lock acquire lost a race; the caller may retry with backoff.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lock on {scope} '{id}' is held by another action")]
pub struct LockContention {
    pub scope: &'static str,
    pub id: String,
}

impl LockContention {
    pub fn new(scope: &'static str, id: impl Into<String>) -> Self {
        LockContention {
            scope,
            id: id.into(),
        }
    }
}

/// A cluster lock held by this action was stolen by an admin/forced operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lock lost: cluster '{cluster_id}' lock was stolen by another holder")]
pub struct LockLost {
    pub cluster_id: String,
}

impl LockLost {
    pub fn new(cluster_id: impl Into<String>) -> Self {
        LockLost {
            cluster_id: cluster_id.into(),
        }
    }
}

/// A driver call failed in a way that is expected to be transient
/// (connection errors, HTTP 5xx, timeouts). The driver itself retries;
/// this variant is surfaced only once its own retries are exhausted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("driver call for {operation} failed transiently: {reason}")]
pub struct DriverTransient {
    pub operation: &'static str,
    pub reason: String,
}

impl DriverTransient {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        DriverTransient {
            operation,
            reason: reason.into(),
        }
    }
}

/// A driver call failed in a way retrying cannot fix (HTTP 4xx, validation).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("driver call for {operation} failed: {reason}")]
pub struct DriverFatal {
    pub operation: &'static str,
    pub reason: String,
}

impl DriverFatal {
    pub fn new(operation: &'static str, reason: impl Into<String>) -> Self {
        DriverFatal {
            operation,
            reason: reason.into(),
        }
    }
}

/// The engine that owned an action or lock stopped sending heartbeats.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("engine '{engine_id}' failure detected by liveness sweep")]
pub struct EngineFailure {
    pub engine_id: String,
}

impl EngineFailure {
    pub fn new(engine_id: impl Into<String>) -> Self {
        EngineFailure {
            engine_id: engine_id.into(),
        }
    }
}

/// Umbrella error type carried across component boundaries.
///
/// Each variant maps 1:1 to the error kinds in the error handling design:
/// retry classification lives on the enum so callers don't need to
/// pattern-match every concrete struct.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error(transparent)]
    MultipleChoices(#[from] MultipleChoices),
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameter),
    #[error(transparent)]
    BadRequest(#[from] BadRequest),
    #[error(transparent)]
    ResourceBusy(#[from] ResourceBusy),
    #[error(transparent)]
    LockContention(#[from] LockContention),
    #[error(transparent)]
    LockLost(#[from] LockLost),
    #[error(transparent)]
    DriverTransient(#[from] DriverTransient),
    #[error(transparent)]
    DriverFatal(#[from] DriverFatal),
    #[error(transparent)]
    EngineFailure(#[from] EngineFailure),
}

/// Describes how a caller should respond to an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Never retry; surface directly to the originator.
    Never,
    /// Retry the lock acquire per `lock_retry_times`/`lock_retry_interval`.
    LockBackoff,
    /// The driver already exhausted its own retries; give up.
    ExhaustedByDriver,
}

impl EngineError {
    pub fn retry_class(&self) -> RetryClass {
        match self {
            EngineError::LockContention(_) => RetryClass::LockBackoff,
            EngineError::DriverTransient(_) => RetryClass::ExhaustedByDriver,
            _ => RetryClass::Never,
        }
    }

    /// True when this error should mark the owning action `FAILED` outright
    /// (as opposed to being retried transparently by the caller).
    pub fn is_terminal(&self) -> bool {
        !matches!(self.retry_class(), RetryClass::LockBackoff)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_contention_is_retryable() {
        let err = EngineError::from(LockContention::new("cluster", "c-1"));
        assert_eq!(err.retry_class(), RetryClass::LockBackoff);
        assert!(!err.is_terminal());
    }

    #[test]
    fn not_found_is_never_retried() {
        let err = EngineError::from(NotFound::new("cluster", "c-1"));
        assert_eq!(err.retry_class(), RetryClass::Never);
        assert!(err.is_terminal());
    }

    #[test]
    fn driver_transient_exhausted_is_terminal() {
        let err = EngineError::from(DriverTransient::new("create", "timed out"));
        assert_eq!(err.retry_class(), RetryClass::ExhaustedByDriver);
        assert!(err.is_terminal());
    }
}
