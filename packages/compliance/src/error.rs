//! Citadel-Compliance error types.

use thiserror::Error;

/// Structural errors in the compliance subsystem.
///
/// Policy denials are not errors; they travel as
/// [`crate::policy::PolicyResult`] data.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// A policy id was registered twice.
    #[error("duplicate policy id: {policy_id}")]
    DuplicatePolicy { policy_id: String },

    /// A schema was registered twice for the same action.
    #[error("duplicate schema for action: {action}")]
    DuplicateSchema { action: String },

    /// An invalid regular expression in a pattern-based policy.
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}
