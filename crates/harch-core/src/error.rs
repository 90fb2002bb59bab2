//! Error types for the core crate.
//!
//! Only configuration mistakes and broken scheduling invariants are errors.
//! A busy or empty resource is reported through `bool`/`Option` returns and
//! simply retried on a later tick.

use thiserror::Error;

use crate::controller::Priority;
use crate::pool::CellId;

/// Errors produced while building or running a distillation pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarchError {
    /// A configuration value is missing or out of range.
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A generator was asked for a pair but has no source.
    #[error("Generator cell {0} has no pair source configured")]
    NoPairSource(CellId),

    /// An action failed after its availability predicate held.
    #[error("Scheduling invariant violated at priority '{priority}': {detail}")]
    Scheduling {
        /// The priority step that failed.
        priority: Priority,
        /// What went wrong.
        detail: String,
    },

    /// YAML (de)serialisation failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON (de)serialisation failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarchError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        HarchError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn scheduling(priority: Priority, detail: impl Into<String>) -> Self {
        HarchError::Scheduling {
            priority,
            detail: detail.into(),
        }
    }
}

/// Result type for core operations.
pub type HarchResult<T> = Result<T, HarchError>;
