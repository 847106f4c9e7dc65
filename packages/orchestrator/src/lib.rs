//! Citadel-Orchestrator: Routing, Handoffs, and Workflows
//!
//! The orchestration pillar: requests enter through the [`Gateway`], are
//! matched to a capability, routed to the healthiest agent advertising it,
//! and executed behind the compliance gate and TIRS drift detection.
//! Multi-step workflows re-verify every inter-agent handoff.
//!
//! # Architecture
//!
//! - [`capability`] - the closed capability set and the action matcher
//! - [`agent`] - the agent plug-in interface and the guarded execution host
//! - [`agents`] - the six built-in domain agents
//! - [`router`] - copy-on-write capability routing with health scoring
//! - [`handoff`] - compliance + TIRS verification at every transition
//! - [`workflow`] - sequential and parallel DAG execution
//! - [`gateway`] - the root entry point
//! - [`external`] - optional IAP and reasoning-oracle integrations

pub mod agent;
pub mod agents;
pub mod capability;
pub mod error;
pub mod external;
pub mod gateway;
pub mod handoff;
pub mod ids;
pub mod router;
pub mod workflow;

pub use agent::{ActionHandler, ActionResult, Agent, AgentDescriptor, AgentError, ExecutionOutcome};
pub use capability::{Capability, CapabilityMatcher};
pub use error::OrchestratorError;
pub use external::{
    Assessment, ExternalError, HeuristicOracle, IapResult, IntentAuthenticator, Recommendation,
    ReasoningOracle,
};
pub use gateway::{Gateway, GatewayConfig, RequestResult};
pub use handoff::{HandoffResult, HandoffVerifier};
pub use router::{CapabilityRouter, RouteDecision};
pub use workflow::{
    StepResult, Workflow, WorkflowEngine, WorkflowMode, WorkflowResult, WorkflowStep,
};
