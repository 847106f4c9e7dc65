//! Citadel-Compliance: Corporate Policy Evaluation Pipeline
//!
//! Evaluates every agent action against the applicable policy set and
//! merges the individual verdicts into one aggregate decision:
//! Allow / Modify / Warn / Escalate / Deny, with payload rewrites.
//!
//! # Architecture
//!
//! - [`policy`] - policy trait, verdict/severity/result types, rule and
//!   threshold policy bases
//! - [`schema`] - per-action payload schema descriptors, consulted before
//!   policy evaluation
//! - [`policies`] - the built-in domain policy set (finance, legal, HR,
//!   IT/security, procurement, privacy)
//! - [`engine`] - policy selection, evaluation, and verdict merging
//!
//! # Example
//!
//! ```rust,ignore
//! use citadel_compliance::{ComplianceEngine, PolicyContext};
//!
//! let engine = ComplianceEngine::with_default_policies();
//! let payload = serde_json::json!({"amount": 250}).as_object().unwrap().clone();
//! let aggregate = engine.evaluate("approve_expense", &payload, &PolicyContext::default(), None);
//! assert!(!aggregate.allowed);
//! ```

pub mod engine;
pub mod error;
pub mod policies;
pub mod policy;
pub mod schema;

pub use engine::{ComplianceAggregate, ComplianceEngine, EngineStats};
pub use error::ComplianceError;
pub use policy::{
    bool_field, bool_field_any, number_field, number_field_any, str_field, str_field_any, Payload,
    Policy, PolicyCategory, PolicyContext, PolicyMeta, PolicyResult, PolicySeverity, PolicyStats,
    PolicyVerdict, RulePolicy, ThresholdPolicy,
};
pub use schema::{ActionSchema, FieldSpec, FieldType, SchemaRegistry, SchemaReport};
