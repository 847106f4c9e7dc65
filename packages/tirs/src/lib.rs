//! Citadel-TIRS: Temporal Intent Risk & Simulation
//!
//! Behavioral drift detection for AI agents. Every intent an agent submits
//! is scored on five independent signals, smoothed over time, and compared
//! against context-adjusted thresholds. Crossing a threshold triggers
//! enforcement (throttle / pause / kill), a human-readable explanation, and
//! a tamper-evident forensic snapshot.
//!
//! # Architecture
//!
//! - [`embeddings`] - intent text to vector, cosine distance
//! - [`temporal`] - time-decay weighting of historical scalars
//! - [`velocity`] - per-agent action-rate anomaly detection
//! - [`contextual`] - business-context threshold adjustment
//! - [`detector`] - five-signal drift scoring and the agent state machine
//! - [`explainer`] - counterfactuals, remediations, pattern matching
//! - [`snapshot`] - hash-chained forensic snapshots, gzipped on disk
//! - [`facade`] - the single [`Tirs`] entry point combining all of the above
//!
//! # Example
//!
//! ```rust,ignore
//! use citadel_tirs::{Tirs, TirsConfig};
//!
//! let tirs = Tirs::new(TirsConfig::default());
//! let analysis = tirs.analyze_intent(
//!     "finance_agent",
//!     "approve_expense: travel reimbursement",
//!     &["approve_expense".into()],
//!     true,
//!     None,
//!     None,
//! )?;
//! println!("risk={} level={:?}", analysis.risk_score, analysis.risk_level);
//! ```

pub mod context;
pub mod contextual;
pub mod detector;
pub mod embeddings;
pub mod error;
pub mod explainer;
pub mod facade;
pub mod snapshot;
pub mod temporal;
pub mod velocity;

pub use context::OpContext;
pub use contextual::{BusinessContext, BusinessHours, ContextualThresholds, RiskSeason, ThresholdConfig};
pub use detector::{
    AgentProfile, AgentStatus, ContextMode, DetectorConfig, DriftDetector, DriftResult,
    DriftSignal, RiskLevel, SignalWeights,
};
pub use embeddings::{cosine_distance, Embedder, HashingEmbedder};
pub use error::TirsError;
pub use explainer::{DriftExplainer, DriftExplanation};
pub use facade::{IntentAnalysis, Tirs, TirsConfig};
pub use snapshot::{ChainVerification, ForensicSnapshot, SnapshotManager};
pub use temporal::{DecayConfig, DecayFunction, TemporalDecay};
pub use velocity::{VelocityConfig, VelocityReading, VelocityTracker};
