//! Citadel-Orchestrator error types.

use thiserror::Error;

/// Structural orchestration errors.
///
/// Request-level outcomes (policy denied, agent paused, risk enforcement)
/// are data on [`crate::agent::ActionResult`] and
/// [`crate::gateway::RequestResult`]; errors here mean the caller asked for
/// something that does not exist or is malformed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No workflow registered under this id.
    #[error("unknown workflow: {workflow_id}")]
    UnknownWorkflow { workflow_id: String },

    /// A workflow id was registered twice.
    #[error("duplicate workflow: {workflow_id}")]
    DuplicateWorkflow { workflow_id: String },

    /// The workflow's step graph is malformed.
    #[error("invalid workflow {workflow_id}: {reason}")]
    InvalidWorkflow { workflow_id: String, reason: String },

    /// An agent id was registered twice.
    #[error("duplicate agent: {agent_id}")]
    DuplicateAgent { agent_id: String },

    /// Error from the TIRS subsystem.
    #[error(transparent)]
    Tirs(#[from] citadel_tirs::TirsError),
}
