//! Citadel-TIRS error types.

use thiserror::Error;

/// Errors surfaced by the TIRS subsystem.
///
/// Enforcement outcomes (paused, killed) are not errors - they travel as
/// data in [`crate::detector::DriftResult`]. Errors here are structural:
/// bad configuration, unknown agents, integrity or I/O failures.
#[derive(Debug, Error)]
pub enum TirsError {
    /// Signal weights must sum to 1.0.
    #[error("signal weights sum to {sum:.4}, expected 1.0")]
    InvalidWeights { sum: f64 },

    /// No profile exists for the requested agent.
    #[error("unknown agent: {agent_id}")]
    UnknownAgent { agent_id: String },

    /// Admin operation not valid for the agent's current status.
    #[error("agent {agent_id} is {status}; cannot {operation}")]
    InvalidTransition {
        agent_id: String,
        status: String,
        operation: String,
    },

    /// Snapshot not found in memory or on disk.
    #[error("snapshot not found: {snapshot_id}")]
    SnapshotNotFound { snapshot_id: String },

    /// Snapshot chain failed integrity verification.
    #[error("snapshot chain for {agent_id} failed verification: {detail}")]
    IntegrityFailure { agent_id: String, detail: String },

    /// Snapshot persistence or export I/O failure.
    #[error("snapshot storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Snapshot serialization failure.
    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The request deadline elapsed before the analysis committed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The request was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}
