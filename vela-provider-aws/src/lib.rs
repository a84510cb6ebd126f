//! Vela AWS Provider
//!
//! Resource kinds backed by AWS service APIs. Each module defines the
//! vendor API trait one resource kind needs, the lifecycle adapter that
//! drives it, and the attribute schema; `sdk` provides the SDK-backed
//! implementations of those traits.

pub mod config;
pub mod cookie_policy;
pub mod image_copy;
pub mod sdk;
pub mod search_domain;
pub mod util;

use thiserror::Error;
use vela_core::error::LifecycleError;
use vela_core::schema::SchemaViolation;

/// Error from a raw vendor API call; the vendor's message is carried
/// verbatim and wrapped with operation context at the lifecycle boundary.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct VendorError(pub String);

impl VendorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub(crate) fn invalid(violations: Vec<SchemaViolation>) -> LifecycleError {
    LifecycleError::validation(violations.iter().map(ToString::to_string).collect())
}
