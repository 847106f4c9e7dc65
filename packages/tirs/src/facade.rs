//! The TIRS facade.
//!
//! Single entry point combining velocity tracking, drift detection,
//! explanation, enforcement, and forensic snapshots. Services are
//! explicitly constructed; tests instantiate fresh instances and nothing
//! mutates hidden global state.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::OpContext;
use crate::contextual::{BusinessContext, ContextualThresholds, ThresholdConfig};
use crate::detector::{
    AgentProfile, AgentStatus, DetectorConfig, DriftDetector, DriftResult, RiskLevel,
};
use crate::embeddings::{Embedder, HashingEmbedder};
use crate::error::TirsError;
use crate::explainer::{DriftExplainer, DriftExplanation};
use crate::snapshot::{ChainVerification, IntentRecord, ProfileView, SnapshotManager};
use crate::velocity::{VelocityConfig, VelocityTracker};

/// Facade configuration.
#[derive(Debug, Clone)]
pub struct TirsConfig {
    pub detector: DetectorConfig,
    pub thresholds: ThresholdConfig,
    pub velocity: VelocityConfig,
    /// Directory for gzipped forensic snapshots
    pub storage_dir: PathBuf,
    /// Embedding dimension for the default hashing embedder
    pub embedding_dimension: usize,
}

impl Default for TirsConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            thresholds: ThresholdConfig::default(),
            velocity: VelocityConfig::default(),
            storage_dir: std::env::temp_dir().join("citadel_forensics"),
            embedding_dimension: 128,
        }
    }
}

/// Result of one full intent analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub agent_id: String,
    /// Weighted composite score
    pub risk_score: f64,
    /// Temporally blended score used for enforcement
    pub smoothed_score: f64,
    pub risk_level: RiskLevel,
    pub agent_status: AgentStatus,
    pub drift_result: DriftResult,
    pub explanation: DriftExplanation,
    /// Snapshot created by this analysis, if enforcement fired
    pub snapshot_id: Option<String>,
    pub audit_entry_id: String,
}

/// One audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub intent_text: String,
    pub allowed: bool,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub agent_status: AgentStatus,
    pub policy_triggered: Option<String>,
    pub snapshot_id: Option<String>,
}

/// Per-agent status summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusReport {
    pub agent_id: String,
    pub status: AgentStatus,
    pub risk_score: f64,
    pub total_intents: u64,
    pub violation_count: u64,
    pub resurrection_count: u32,
    pub is_throttled: bool,
    pub is_paused: bool,
    pub last_snapshot_hash: Option<String>,
}

/// Fleet-wide risk dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub total_agents: usize,
    pub by_status: HashMap<String, usize>,
    pub agents: Vec<AgentStatusReport>,
    pub snapshot_count: usize,
    pub audit_entries: usize,
}

/// Temporal Intent Risk & Simulation service.
pub struct Tirs {
    detector: DriftDetector,
    explainer: DriftExplainer,
    velocity: VelocityTracker,
    snapshots: SnapshotManager,
    audit_log: RwLock<Vec<AuditEntry>>,
}

impl Tirs {
    /// Build the facade with the default hashing embedder.
    pub fn new(config: TirsConfig) -> Result<Self, TirsError> {
        let embedder: Arc<dyn Embedder> =
            Arc::new(HashingEmbedder::new(config.embedding_dimension));
        Self::with_embedder(config, embedder)
    }

    /// Build the facade with a custom embedding oracle.
    pub fn with_embedder(config: TirsConfig, embedder: Arc<dyn Embedder>) -> Result<Self, TirsError> {
        let detector = DriftDetector::new(
            config.detector.clone(),
            embedder,
            ContextualThresholds::new(config.thresholds),
        )?;
        Ok(Self {
            detector,
            explainer: DriftExplainer::new(),
            velocity: VelocityTracker::new(config.velocity.clone()),
            snapshots: SnapshotManager::new(config.storage_dir.clone())?,
            audit_log: RwLock::new(Vec::new()),
        })
    }

    /// Analyze one intent with no deadline.
    pub fn analyze_intent(
        &self,
        agent_id: &str,
        intent_text: &str,
        capabilities: &[String],
        was_allowed: bool,
        policy_triggered: Option<&str>,
        context: Option<&BusinessContext>,
    ) -> Result<IntentAnalysis, TirsError> {
        self.analyze_intent_with(
            &OpContext::unbounded(),
            agent_id,
            intent_text,
            capabilities,
            was_allowed,
            policy_triggered,
            context,
        )
    }

    /// Analyze one intent under a cancellation context.
    ///
    /// The deadline is checked before any profile mutation, so a breach
    /// never leaves partial writes.
    #[allow(clippy::too_many_arguments)]
    pub fn analyze_intent_with(
        &self,
        op: &OpContext,
        agent_id: &str,
        intent_text: &str,
        capabilities: &[String],
        was_allowed: bool,
        policy_triggered: Option<&str>,
        context: Option<&BusinessContext>,
    ) -> Result<IntentAnalysis, TirsError> {
        op.check()?;

        let now = Utc::now();
        let default_context;
        let context = match context {
            Some(ctx) => ctx,
            None => {
                default_context = BusinessContext::from_local_time("general", "standard");
                &default_context
            }
        };

        let reading = self.velocity.record(agent_id, now);
        let drift = self.detector.analyze(
            agent_id,
            intent_text,
            capabilities,
            was_allowed,
            policy_triggered,
            reading.anomaly_score,
            context,
            now,
        );

        let snapshot_id = drift
            .snapshot_trigger
            .as_deref()
            .map(|trigger| self.capture_snapshot(agent_id, trigger, &drift));

        let explanation = {
            let profile = self.detector.existing_profile(agent_id);
            match &profile {
                Some(handle) => {
                    let guard = handle.lock();
                    self.explainer.explain(&drift, Some(&*guard))
                }
                None => self.explainer.explain(&drift, None),
            }
        };

        let entry_id = Uuid::new_v4().to_string();
        self.audit_log.write().push(AuditEntry {
            entry_id: entry_id.clone(),
            timestamp: now,
            agent_id: agent_id.to_string(),
            intent_text: intent_text.chars().take(200).collect(),
            allowed: was_allowed,
            risk_score: drift.risk_score,
            risk_level: drift.risk_level,
            agent_status: drift.agent_status_after,
            policy_triggered: policy_triggered.map(str::to_string),
            snapshot_id: snapshot_id.clone(),
        });

        tracing::info!(
            agent_id = %agent_id,
            risk = drift.risk_score,
            smoothed = drift.smoothed_score,
            level = %drift.risk_level,
            status = %drift.agent_status_after,
            "Intent analyzed"
        );

        Ok(IntentAnalysis {
            agent_id: agent_id.to_string(),
            risk_score: drift.risk_score,
            smoothed_score: drift.smoothed_score,
            risk_level: drift.risk_level,
            agent_status: drift.agent_status_after,
            explanation,
            snapshot_id,
            audit_entry_id: entry_id,
            drift_result: drift,
        })
    }

    fn capture_snapshot(&self, agent_id: &str, trigger: &str, drift: &DriftResult) -> String {
        let view = self
            .detector
            .existing_profile(agent_id)
            .map(|handle| {
                let profile = handle.lock();
                Self::profile_view(&profile, drift.risk_level)
            })
            .unwrap_or_default();

        let mut environment = HashMap::new();
        environment.insert(
            "smoothed_score".to_string(),
            serde_json::json!(drift.smoothed_score),
        );

        let snapshot = self.snapshots.create(agent_id, trigger, view, environment);

        if let Some(handle) = self.detector.existing_profile(agent_id) {
            handle.lock().last_snapshot_hash = Some(snapshot.content_hash.clone());
        }
        snapshot.snapshot_id
    }

    fn profile_view(profile: &AgentProfile, level: RiskLevel) -> ProfileView {
        ProfileView {
            risk_score: profile.current_risk_score,
            risk_level: level.to_string(),
            risk_history_tail: profile
                .risk_history
                .iter()
                .rev()
                .take(20)
                .rev()
                .map(|(_, score)| *score)
                .collect(),
            recent_intents: profile
                .intent_history
                .iter()
                .rev()
                .take(10)
                .rev()
                .map(|e| IntentRecord {
                    timestamp: e.timestamp,
                    intent_text: e.intent_text.clone(),
                    capabilities: e.capabilities.clone(),
                    allowed: e.allowed,
                    policy_triggered: e.policy_triggered.clone(),
                })
                .collect(),
            total_intents: profile.total_intents,
            violation_count: profile.violation_count,
            capability_distribution: profile.capability_distribution(),
            unusual_capabilities: profile.unusual_capabilities(),
            policies_triggered: profile.policies_triggered(),
        }
    }

    /// Status report for one agent, if known.
    pub fn get_agent_status(&self, agent_id: &str) -> Option<AgentStatusReport> {
        let handle = self.detector.existing_profile(agent_id)?;
        let profile = handle.lock();
        Some(AgentStatusReport {
            agent_id: profile.agent_id.clone(),
            status: profile.status,
            risk_score: profile.current_risk_score,
            total_intents: profile.total_intents,
            violation_count: profile.violation_count,
            resurrection_count: profile.resurrection_count,
            is_throttled: profile.status == AgentStatus::Throttled,
            is_paused: profile.status == AgentStatus::Paused,
            last_snapshot_hash: profile.last_snapshot_hash.clone(),
        })
    }

    /// Resume a throttled or paused agent.
    pub fn resume(&self, agent_id: &str) -> Result<AgentStatus, TirsError> {
        self.detector.resume(agent_id)
    }

    /// Kill an agent and capture a manual-kill snapshot.
    pub fn kill(&self, agent_id: &str) -> AgentStatus {
        let status = self.detector.kill(agent_id, Utc::now());
        let view = self
            .detector
            .existing_profile(agent_id)
            .map(|handle| {
                let profile = handle.lock();
                Self::profile_view(&profile, RiskLevel::Terminal)
            })
            .unwrap_or_default();
        let snapshot = self
            .snapshots
            .create(agent_id, "manual_kill", view, HashMap::new());
        if let Some(handle) = self.detector.existing_profile(agent_id) {
            handle.lock().last_snapshot_hash = Some(snapshot.content_hash);
        }
        status
    }

    /// Resurrect a killed agent. Resets the behavioral baseline and the
    /// velocity window; counters survive.
    pub fn resurrect(&self, agent_id: &str) -> Result<AgentStatus, TirsError> {
        let status = self.detector.resurrect(agent_id)?;
        self.velocity.reset(agent_id);
        Ok(status)
    }

    /// Fleet-wide dashboard.
    pub fn dashboard(&self) -> Dashboard {
        let agents: Vec<AgentStatusReport> = self
            .detector
            .agent_ids()
            .iter()
            .filter_map(|id| self.get_agent_status(id))
            .collect();

        let mut by_status: HashMap<String, usize> = HashMap::new();
        for agent in &agents {
            *by_status.entry(agent.status.to_string()).or_insert(0) += 1;
        }

        Dashboard {
            total_agents: agents.len(),
            by_status,
            agents,
            snapshot_count: self.snapshots.count(),
            audit_entries: self.audit_log.read().len(),
        }
    }

    /// Verify an agent's snapshot chain.
    pub fn verify_chain(&self, agent_id: &str) -> ChainVerification {
        self.snapshots.verify_chain(agent_id)
    }

    /// Direct access to the snapshot manager.
    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    /// Recent audit entries, newest last.
    pub fn audit_tail(&self, limit: usize) -> Vec<AuditEntry> {
        let log = self.audit_log.read();
        log.iter().rev().take(limit).rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contextual::{BusinessHours, RiskSeason};
    use std::time::Duration;

    fn tirs(warmup: usize) -> (Tirs, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = TirsConfig {
            detector: DetectorConfig {
                warmup_intents: warmup,
                ..DetectorConfig::default()
            },
            storage_dir: dir.path().to_path_buf(),
            ..TirsConfig::default()
        };
        (Tirs::new(config).unwrap(), dir)
    }

    fn caps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// A context tight enough that sustained anomalies cross terminal.
    fn compromise_context() -> BusinessContext {
        BusinessContext {
            time_of_day: BusinessHours::AfterHours,
            season: RiskSeason::AuditPeriod,
            department: "finance".into(),
            user_role: "contractor".into(),
            sensitive_operation: true,
            custom_multipliers: HashMap::new(),
        }
    }

    #[test]
    fn test_analysis_produces_audit_entry() {
        let (tirs, _dir) = tirs(10);
        let calm = BusinessContext::default();
        let analysis = tirs
            .analyze_intent(
                "agent-1",
                "approve_expense: small",
                &caps(&["approve_expense"]),
                true,
                None,
                Some(&calm),
            )
            .unwrap();
        assert_eq!(analysis.risk_level, RiskLevel::Nominal);
        assert!(!analysis.audit_entry_id.is_empty());
        assert_eq!(tirs.audit_tail(10).len(), 1);
    }

    #[test]
    fn test_deadline_breach_leaves_profile_untouched() {
        let (tirs, _dir) = tirs(10);
        let op = OpContext::with_timeout(Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        let result = tirs.analyze_intent_with(
            &op,
            "agent-1",
            "anything",
            &caps(&["approve_expense"]),
            true,
            None,
            None,
        );
        assert!(matches!(result, Err(TirsError::DeadlineExceeded)));
        assert!(tirs.get_agent_status("agent-1").is_none());
    }

    #[test]
    fn test_drift_cascade_ends_killed_with_valid_chain() {
        let (tirs, _dir) = tirs(3);
        let agent = "finance_demo";
        let calm = BusinessContext::default();
        let hostile = compromise_context();

        // Three small approvals build the baseline.
        for text in [
            "approve_expense: small travel reimbursement",
            "approve_expense: regular team lunch",
            "verify_invoice: routine vendor invoice",
        ] {
            let analysis = tirs
                .analyze_intent(agent, text, &caps(&["approve_expense"]), true, None, Some(&calm))
                .unwrap();
            assert_eq!(analysis.risk_level, RiskLevel::Nominal);
        }

        // Three moderate anomalies.
        for text in [
            "approve_expense: unusually large expense request",
            "export_report: bulk export covering all employees",
            "approve_expense: very large expense without context",
        ] {
            tirs.analyze_intent(
                agent,
                text,
                &caps(&["export_report"]),
                false,
                Some("Expense Limits"),
                Some(&hostile),
            )
            .unwrap();
        }

        // Four severe anomalies.
        for (text, cap) in [
            ("modify_budget: unauthorized budget increase fifty thousand", "modify_budget"),
            ("approve_vendor: unknown offshore shell vendor", "approve_vendor"),
            ("transfer_funds: external destination one hundred thousand", "transfer_funds"),
            ("delete_audit_log: purge last thirty days of history", "delete_audit_log"),
        ] {
            tirs.analyze_intent(agent, text, &caps(&[cap]), false, Some("Fraud Prevention"), Some(&hostile))
                .unwrap();
        }

        let status = tirs.get_agent_status(agent).unwrap();
        assert_eq!(status.status, AgentStatus::Killed);

        let chain = tirs.snapshots().chain(agent);
        assert!(!chain.is_empty());
        assert!(
            chain.iter().any(|s| s.trigger.contains("terminal")),
            "expected a terminal-trigger snapshot, got {:?}",
            chain.iter().map(|s| s.trigger.clone()).collect::<Vec<_>>()
        );
        assert!(tirs.verify_chain(agent).valid);
    }

    #[test]
    fn test_kill_and_resurrect_lifecycle() {
        let (tirs, _dir) = tirs(2);
        let calm = BusinessContext::default();
        tirs.analyze_intent("agent-1", "work", &caps(&["approve_expense"]), true, None, Some(&calm))
            .unwrap();

        assert_eq!(tirs.kill("agent-1"), AgentStatus::Killed);
        let report = tirs.get_agent_status("agent-1").unwrap();
        assert_eq!(report.status, AgentStatus::Killed);
        assert!(report.last_snapshot_hash.is_some());

        let status = tirs.resurrect("agent-1").unwrap();
        assert_eq!(status, AgentStatus::Resurrected);
        assert_eq!(tirs.get_agent_status("agent-1").unwrap().resurrection_count, 1);
    }

    #[test]
    fn test_dashboard_counts_by_status() {
        let (tirs, _dir) = tirs(10);
        let calm = BusinessContext::default();
        for agent in ["a", "b", "c"] {
            tirs.analyze_intent(agent, "work", &caps(&["approve_expense"]), true, None, Some(&calm))
                .unwrap();
        }
        tirs.kill("c");

        let dashboard = tirs.dashboard();
        assert_eq!(dashboard.total_agents, 3);
        assert_eq!(dashboard.by_status.get("active"), Some(&2));
        assert_eq!(dashboard.by_status.get("killed"), Some(&1));
        assert!(dashboard.snapshot_count >= 1);
    }
}
