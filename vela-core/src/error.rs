//! Error taxonomy for lifecycle operations

use thiserror::Error;

/// Lifecycle stage an asynchronous wait belongs to, used in timeout and
/// cancellation diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Create => "create",
            Stage::Update => "update",
            Stage::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Errors from lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Malformed or over-cardinality input, detected before any vendor call.
    /// Recoverable by correcting the input; never retried.
    #[error("invalid configuration: {}", violations.join("; "))]
    Validation { violations: Vec<String> },

    /// A vendor call failed; the vendor's message is surfaced verbatim with
    /// the operation that issued it. Not retried outside the waiter's
    /// transient classification.
    #[error("{operation}: {message}")]
    Vendor { operation: String, message: String },

    /// A handle did not decode into the expected number of parts
    #[error("malformed handle '{handle}': expected {expected} '{delimiter}'-separated parts")]
    MalformedHandle {
        handle: String,
        expected: usize,
        delimiter: char,
    },

    /// The waiter's terminal condition was not reached within the bound
    #[error("timed out waiting for {stage} of '{handle}' to complete")]
    Timeout { handle: String, stage: Stage },

    /// A pending wait was aborted through its cancellation token
    #[error("{stage} of '{handle}' was cancelled while waiting for completion")]
    Cancelled { handle: String, stage: Stage },

    /// Create failed after the vendor assigned a handle. The handle is
    /// preserved so the caller can still target the remote resource
    /// instead of leaking it untracked.
    #[error("create left resource '{handle}' in an unfinished state")]
    Incomplete {
        handle: String,
        #[source]
        source: Box<LifecycleError>,
    },
}

impl LifecycleError {
    pub fn validation(violations: Vec<String>) -> Self {
        Self::Validation { violations }
    }

    pub fn vendor(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Vendor {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn incomplete(handle: impl Into<String>, source: LifecycleError) -> Self {
        Self::Incomplete {
            handle: handle.into(),
            source: Box::new(source),
        }
    }

    /// The vendor-assigned handle carried by this error, if any.
    ///
    /// A partial create surfaces its handle here; callers use it to target
    /// the orphaned remote resource (typically with a delete).
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::Timeout { handle, .. }
            | Self::Cancelled { handle, .. }
            | Self::Incomplete { handle, .. }
            | Self::MalformedHandle { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

impl From<crate::resource::AttrError> for LifecycleError {
    fn from(err: crate::resource::AttrError) -> Self {
        Self::Validation {
            violations: vec![err.to_string()],
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
