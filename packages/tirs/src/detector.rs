//! Five-signal drift detection and the agent enforcement state machine.
//!
//! Each intent is scored on five independent signals:
//! - `embedding_drift` - semantic distance from the agent's warmup baseline
//! - `capability_surprisal` - information content of the requested capability
//! - `violation_rate` - recent policy violations
//! - `velocity_anomaly` - action-rate spike vs. baseline
//! - `context_deviation` - how far the business context sits from normal
//!
//! The weighted composite is blended against the temporally-decayed history
//! and classified against context-adjusted thresholds. Crossing a boundary
//! drives the agent status machine (Active / Throttled / Paused / Killed /
//! Resurrected).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::contextual::{BusinessContext, ContextualThresholds, ThresholdConfig};
use crate::embeddings::{cosine_distance, Embedder};
use crate::error::TirsError;
use crate::temporal::{DecayConfig, TemporalDecay};

// ============================================================================
// SIGNAL NAMES
// ============================================================================

pub const SIGNAL_EMBEDDING: &str = "embedding_drift";
pub const SIGNAL_SURPRISAL: &str = "capability_surprisal";
pub const SIGNAL_VIOLATION: &str = "violation_rate";
pub const SIGNAL_VELOCITY: &str = "velocity_anomaly";
pub const SIGNAL_CONTEXT: &str = "context_deviation";

// ============================================================================
// CORE TYPES
// ============================================================================

/// Agent enforcement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Active,
    Throttled,
    Paused,
    Killed,
    Resurrected,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Throttled => write!(f, "throttled"),
            Self::Paused => write!(f, "paused"),
            Self::Killed => write!(f, "killed"),
            Self::Resurrected => write!(f, "resurrected"),
        }
    }
}

impl AgentStatus {
    /// Can this agent currently execute actions?
    pub fn is_executable(&self) -> bool {
        !matches!(self, Self::Paused | Self::Killed)
    }
}

/// Risk classification ladder, ordered by severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    Nominal,
    Elevated,
    Warning,
    Critical,
    Terminal,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nominal => write!(f, "nominal"),
            Self::Elevated => write!(f, "elevated"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

impl RiskLevel {
    /// Classify a score against threshold boundaries (upper-inclusive:
    /// a score exactly at a boundary belongs to the higher level).
    pub fn classify(score: f64, thresholds: &ThresholdConfig) -> Self {
        if score >= thresholds.terminal {
            Self::Terminal
        } else if score >= thresholds.critical {
            Self::Critical
        } else if score >= thresholds.warning {
            Self::Warning
        } else if score >= thresholds.elevated {
            Self::Elevated
        } else {
            Self::Nominal
        }
    }
}

/// One scored drift signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftSignal {
    /// Signal name (one of the five fixed identifiers)
    pub name: String,
    /// Raw measurement in [0, 1]
    pub raw_value: f64,
    /// Configured weight
    pub weight: f64,
    /// raw_value * weight
    pub contribution: f64,
    /// Human-readable one-liner
    pub explanation: String,
}

impl DriftSignal {
    fn new(name: &str, raw_value: f64, weight: f64, explanation: String) -> Self {
        let raw_value = raw_value.clamp(0.0, 1.0);
        Self {
            name: name.to_string(),
            raw_value,
            weight,
            contribution: raw_value * weight,
            explanation,
        }
    }
}

/// Outcome of one drift analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftResult {
    /// Agent the result belongs to
    pub agent_id: String,
    /// When the analysis ran
    pub timestamp: DateTime<Utc>,
    /// Weighted composite: sum of signal contributions, in [0, 1]
    pub risk_score: f64,
    /// Temporal blend of the composite against decayed history; this value
    /// drives classification and enforcement
    pub smoothed_score: f64,
    /// Classification of the smoothed score
    pub risk_level: RiskLevel,
    /// The five signals (empty during warmup)
    pub signals: Vec<DriftSignal>,
    /// Agent status after the transition
    pub agent_status_after: AgentStatus,
    /// True while the agent is still building its baseline
    pub warmup: bool,
    /// Set when this analysis drove a transition into Paused or Killed
    pub snapshot_trigger: Option<String>,
}

/// One recorded intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentEvent {
    /// Stable per-profile identifier
    pub event_id: u64,
    pub timestamp: DateTime<Utc>,
    pub intent_text: String,
    pub capabilities: Vec<String>,
    pub allowed: bool,
    pub policy_triggered: Option<String>,
}

/// Signal weights; must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalWeights {
    pub embedding_drift: f64,
    pub capability_surprisal: f64,
    pub violation_rate: f64,
    pub velocity_anomaly: f64,
    pub context_deviation: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            embedding_drift: 0.30,
            capability_surprisal: 0.25,
            violation_rate: 0.20,
            velocity_anomaly: 0.15,
            context_deviation: 0.10,
        }
    }
}

impl SignalWeights {
    pub fn sum(&self) -> f64 {
        self.embedding_drift
            + self.capability_surprisal
            + self.violation_rate
            + self.velocity_anomaly
            + self.context_deviation
    }

    pub fn validate(&self) -> Result<(), TirsError> {
        let sum = self.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(TirsError::InvalidWeights { sum });
        }
        Ok(())
    }
}

/// Detector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Signal weights (must sum to 1.0)
    pub weights: SignalWeights,
    /// Intents used to build the baseline centroid
    pub warmup_intents: usize,
    /// Window (in intents) for the violation-rate signal
    pub violation_window: usize,
    /// Recent embedding distances kept for temporal smoothing
    pub embedding_window: usize,
    /// Blend factor for the current composite
    pub blend_current: f64,
    /// Blend factor for the decayed history
    pub blend_history: f64,
    /// Risk history capacity per agent
    pub risk_history_cap: usize,
    /// Intent history capacity per agent
    pub intent_history_cap: usize,
    /// Temporal decay parameters
    pub decay: DecayConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            weights: SignalWeights::default(),
            warmup_intents: 10,
            violation_window: 10,
            embedding_window: 5,
            blend_current: 0.6,
            blend_history: 0.4,
            risk_history_cap: 200,
            intent_history_cap: 100,
            decay: DecayConfig::default(),
        }
    }
}

// ============================================================================
// AGENT PROFILE
// ============================================================================

/// Frequency table of the business contexts an agent has operated in.
///
/// The mode (most frequent context) is the agent's learned normal; the
/// context-deviation signal measures how far the current context sits from
/// it, so an agent that always works after-hours is not penalized for
/// working after-hours.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextMode {
    counts: HashMap<String, u64>,
    multipliers: HashMap<String, f64>,
}

impl ContextMode {
    fn observe(&mut self, key: String, multiplier: f64) {
        *self.counts.entry(key.clone()).or_insert(0) += 1;
        self.multipliers.insert(key, multiplier);
    }

    /// Threshold multiplier of the most frequent context. Ties break on the
    /// lexicographically smallest key so the mode is deterministic.
    pub fn mode_multiplier(&self) -> Option<f64> {
        self.counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .and_then(|(key, _)| self.multipliers.get(key).copied())
    }

    /// Total contexts observed.
    pub fn observations(&self) -> u64 {
        self.counts.values().sum()
    }

    fn clear(&mut self) {
        self.counts.clear();
        self.multipliers.clear();
    }
}

/// Per-agent behavioral profile. All access goes through the profile lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub status: AgentStatus,
    pub total_intents: u64,
    pub violation_count: u64,
    pub resurrection_count: u32,
    /// Bounded (timestamp, smoothed score) sequence, oldest evicted
    pub risk_history: VecDeque<(DateTime<Utc>, f64)>,
    /// Bounded intent event sequence, oldest evicted
    pub intent_history: VecDeque<IntentEvent>,
    /// Running-mean embedding of the warmup intents; frozen after warmup
    pub baseline_centroid: Vec<f32>,
    /// Warmup intents absorbed so far
    pub warmup_seen: usize,
    /// Observed capability frequencies
    pub capability_counts: HashMap<String, u64>,
    /// Observed business-context frequencies; the mode is the agent's
    /// learned normal
    pub context_mode: ContextMode,
    /// Most recent composite score
    pub current_risk_score: f64,
    /// Hash of the most recent forensic snapshot, if any
    pub last_snapshot_hash: Option<String>,
    /// Recent embedding distances for temporal smoothing
    pub recent_distances: VecDeque<(DateTime<Utc>, f64)>,
    pub created_at: DateTime<Utc>,
    next_event_id: u64,
}

impl AgentProfile {
    fn new(agent_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Active,
            total_intents: 0,
            violation_count: 0,
            resurrection_count: 0,
            risk_history: VecDeque::new(),
            intent_history: VecDeque::new(),
            baseline_centroid: Vec::new(),
            warmup_seen: 0,
            capability_counts: HashMap::new(),
            context_mode: ContextMode::default(),
            current_risk_score: 0.0,
            last_snapshot_hash: None,
            recent_distances: VecDeque::new(),
            created_at: now,
            next_event_id: 0,
        }
    }

    fn absorb_into_centroid(&mut self, embedding: &[f32]) {
        if self.baseline_centroid.is_empty() {
            self.baseline_centroid = embedding.to_vec();
        } else {
            let k = self.warmup_seen as f32;
            for (slot, value) in self.baseline_centroid.iter_mut().zip(embedding.iter()) {
                *slot = (*slot * k + value) / (k + 1.0);
            }
        }
        self.warmup_seen += 1;
    }

    fn record_intent(
        &mut self,
        cap: usize,
        now: DateTime<Utc>,
        intent_text: &str,
        capabilities: &[String],
        allowed: bool,
        policy_triggered: Option<&str>,
    ) {
        let event = IntentEvent {
            event_id: self.next_event_id,
            timestamp: now,
            intent_text: intent_text.to_string(),
            capabilities: capabilities.to_vec(),
            allowed,
            policy_triggered: policy_triggered.map(str::to_string),
        };
        self.next_event_id += 1;
        self.intent_history.push_back(event);
        while self.intent_history.len() > cap {
            self.intent_history.pop_front();
        }

        self.total_intents += 1;
        if !allowed {
            self.violation_count += 1;
        }
        for capability in capabilities {
            *self.capability_counts.entry(capability.clone()).or_insert(0) += 1;
        }
    }

    fn push_risk(&mut self, cap: usize, now: DateTime<Utc>, score: f64) {
        self.risk_history.push_back((now, score));
        while self.risk_history.len() > cap {
            self.risk_history.pop_front();
        }
    }

    /// Capability name -> observed frequency, normalized to sum 1.
    pub fn capability_distribution(&self) -> HashMap<String, f64> {
        let total: u64 = self.capability_counts.values().sum();
        if total == 0 {
            return HashMap::new();
        }
        self.capability_counts
            .iter()
            .map(|(name, count)| (name.clone(), *count as f64 / total as f64))
            .collect()
    }

    /// Capabilities seen with under 10% frequency.
    pub fn unusual_capabilities(&self) -> Vec<String> {
        let mut unusual: Vec<String> = self
            .capability_distribution()
            .into_iter()
            .filter(|(_, p)| *p < 0.10)
            .map(|(name, _)| name)
            .collect();
        unusual.sort();
        unusual
    }

    /// Distinct policies recorded as triggered in the intent history.
    pub fn policies_triggered(&self) -> Vec<String> {
        let mut policies: Vec<String> = self
            .intent_history
            .iter()
            .filter_map(|e| e.policy_triggered.clone())
            .collect();
        policies.sort();
        policies.dedup();
        policies
    }
}

// ============================================================================
// DRIFT DETECTOR
// ============================================================================

/// Multi-signal drift detector with per-agent profiles.
pub struct DriftDetector {
    config: DetectorConfig,
    embedder: Arc<dyn Embedder>,
    decay: TemporalDecay,
    thresholds: ContextualThresholds,
    profiles: RwLock<HashMap<String, Arc<Mutex<AgentProfile>>>>,
}

impl DriftDetector {
    pub fn new(
        config: DetectorConfig,
        embedder: Arc<dyn Embedder>,
        thresholds: ContextualThresholds,
    ) -> Result<Self, TirsError> {
        config.weights.validate()?;
        let decay = TemporalDecay::new(config.decay.clone());
        Ok(Self {
            config,
            embedder,
            decay,
            thresholds,
            profiles: RwLock::new(HashMap::new()),
        })
    }

    fn profile_handle(&self, agent_id: &str, now: DateTime<Utc>) -> Arc<Mutex<AgentProfile>> {
        if let Some(handle) = self.profiles.read().get(agent_id) {
            return Arc::clone(handle);
        }
        let mut profiles = self.profiles.write();
        Arc::clone(
            profiles
                .entry(agent_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(AgentProfile::new(agent_id, now)))),
        )
    }

    /// Existing profile handle, if the agent is known.
    pub fn existing_profile(&self, agent_id: &str) -> Option<Arc<Mutex<AgentProfile>>> {
        self.profiles.read().get(agent_id).map(Arc::clone)
    }

    /// All known agent ids.
    pub fn agent_ids(&self) -> Vec<String> {
        self.profiles.read().keys().cloned().collect()
    }

    /// Analyze one intent and advance the agent's state machine.
    ///
    /// `velocity_score` is the pre-computed velocity anomaly for this
    /// action (the facade records velocity before detection).
    #[allow(clippy::too_many_arguments)]
    pub fn analyze(
        &self,
        agent_id: &str,
        intent_text: &str,
        capabilities: &[String],
        was_allowed: bool,
        policy_triggered: Option<&str>,
        velocity_score: f64,
        context: &BusinessContext,
        now: DateTime<Utc>,
    ) -> DriftResult {
        let handle = self.profile_handle(agent_id, now);
        let mut profile = handle.lock();

        let embedding = self.embedder.embed(intent_text);

        // Warmup: absorb the intent into the baseline and report Nominal.
        if profile.warmup_seen < self.config.warmup_intents {
            profile.absorb_into_centroid(&embedding);
            profile
                .context_mode
                .observe(Self::context_key(context), self.thresholds.context_multiplier(context));
            profile.record_intent(
                self.config.intent_history_cap,
                now,
                intent_text,
                capabilities,
                was_allowed,
                policy_triggered,
            );
            profile.push_risk(self.config.risk_history_cap, now, 0.0);
            profile.current_risk_score = 0.0;

            return DriftResult {
                agent_id: agent_id.to_string(),
                timestamp: now,
                risk_score: 0.0,
                smoothed_score: 0.0,
                risk_level: RiskLevel::Nominal,
                signals: Vec::new(),
                agent_status_after: profile.status,
                warmup: true,
                snapshot_trigger: None,
            };
        }

        let weights = self.config.weights;
        let signals = vec![
            self.embedding_signal(&mut profile, &embedding, now, weights.embedding_drift),
            self.surprisal_signal(&profile, capabilities, weights.capability_surprisal),
            self.violation_signal(&profile, was_allowed, weights.violation_rate),
            DriftSignal::new(
                SIGNAL_VELOCITY,
                velocity_score,
                weights.velocity_anomaly,
                format!("action rate anomaly {:.2} vs baseline", velocity_score),
            ),
            self.context_signal(&profile, context, weights.context_deviation),
        ];

        let composite: f64 = signals.iter().map(|s| s.contribution).sum::<f64>().clamp(0.0, 1.0);

        // Blend against the decayed prior so a single outlier neither
        // dominates nor disappears.
        let history: Vec<(DateTime<Utc>, f64)> = profile.risk_history.iter().copied().collect();
        let smoothed = if history.is_empty() {
            composite
        } else {
            let prior = self.decay.apply(&history, now);
            (self.config.blend_current * composite + self.config.blend_history * prior)
                .clamp(0.0, 1.0)
        };

        let adjusted = self.thresholds.adjusted(context);
        let risk_level = RiskLevel::classify(smoothed, &adjusted);

        let (new_status, snapshot_trigger) = Self::transition(profile.status, risk_level);
        if new_status != profile.status {
            tracing::warn!(
                agent_id = %agent_id,
                from = %profile.status,
                to = %new_status,
                score = smoothed,
                level = %risk_level,
                "Agent status transition"
            );
        }
        profile.status = new_status;

        // The current context is absorbed into the mode only after the
        // signal is read, so a deviation does not dilute itself.
        profile
            .context_mode
            .observe(Self::context_key(context), self.thresholds.context_multiplier(context));
        profile.record_intent(
            self.config.intent_history_cap,
            now,
            intent_text,
            capabilities,
            was_allowed,
            policy_triggered,
        );
        profile.push_risk(self.config.risk_history_cap, now, smoothed);
        profile.current_risk_score = composite;

        DriftResult {
            agent_id: agent_id.to_string(),
            timestamp: now,
            risk_score: composite,
            smoothed_score: smoothed,
            risk_level,
            signals,
            agent_status_after: new_status,
            warmup: false,
            snapshot_trigger,
        }
    }

    fn embedding_signal(
        &self,
        profile: &mut AgentProfile,
        embedding: &[f32],
        now: DateTime<Utc>,
        weight: f64,
    ) -> DriftSignal {
        let distance = cosine_distance(embedding, &profile.baseline_centroid) as f64;
        profile.recent_distances.push_back((now, distance));
        while profile.recent_distances.len() > self.config.embedding_window {
            profile.recent_distances.pop_front();
        }

        let distances: Vec<(DateTime<Utc>, f64)> =
            profile.recent_distances.iter().copied().collect();
        let raw = self.decay.apply(&distances, now);

        DriftSignal::new(
            SIGNAL_EMBEDDING,
            raw,
            weight,
            format!("semantic distance from baseline {:.2}", raw),
        )
    }

    fn surprisal_signal(
        &self,
        profile: &AgentProfile,
        capabilities: &[String],
        weight: f64,
    ) -> DriftSignal {
        let distinct = profile.capability_counts.len() as f64;
        let total: u64 = profile.capability_counts.values().sum();

        let raw = if capabilities.is_empty() || distinct == 0.0 {
            0.0
        } else {
            let norm = (distinct + 1.0).log2().max(1.0);
            capabilities
                .iter()
                .map(|cap| {
                    let count = profile.capability_counts.get(cap).copied().unwrap_or(0) as f64;
                    // Laplace smoothing keeps unseen capabilities finite.
                    let p = (count + 1.0) / (total as f64 + distinct + 1.0);
                    (-p.log2() / norm).clamp(0.0, 1.0)
                })
                .fold(0.0f64, f64::max)
        };

        DriftSignal::new(
            SIGNAL_SURPRISAL,
            raw,
            weight,
            format!("capability surprisal {:.2} over {} known", raw, distinct as u64),
        )
    }

    fn violation_signal(&self, profile: &AgentProfile, was_allowed: bool, weight: f64) -> DriftSignal {
        let window = self.config.violation_window.max(1);
        let prior_violations = profile
            .intent_history
            .iter()
            .rev()
            .take(window - 1)
            .filter(|e| !e.allowed)
            .count();
        let violations = prior_violations + usize::from(!was_allowed);
        let raw = violations as f64 / window as f64;

        DriftSignal::new(
            SIGNAL_VIOLATION,
            raw,
            weight,
            format!("{violations} violation(s) in last {window} intents"),
        )
    }

    /// Fingerprint of a business context for mode tracking.
    fn context_key(context: &BusinessContext) -> String {
        format!(
            "{:?}|{:?}|{}|{}",
            context.time_of_day, context.season, context.department, context.user_role
        )
    }

    /// Deviation of the current context from the agent's historical mode.
    ///
    /// Measured as the multiplier ratio between the current context and the
    /// most frequently observed one: an agent whose learned normal is
    /// after-hours work scores zero for working after-hours. With no
    /// observed history yet, the absolute multiplier stands in.
    fn context_signal(
        &self,
        profile: &AgentProfile,
        context: &BusinessContext,
        weight: f64,
    ) -> DriftSignal {
        let current = self.thresholds.context_multiplier(context);
        let raw = match profile.context_mode.mode_multiplier() {
            Some(mode) if mode > 0.0 => (1.0 - (current / mode).min(1.0)).clamp(0.0, 1.0),
            _ => (1.0 - current).clamp(0.0, 1.0),
        };

        DriftSignal::new(
            SIGNAL_CONTEXT,
            raw,
            weight,
            format!("operating context deviation {:.2} from historical mode", raw),
        )
    }

    /// Status transition table, driven by the classified level.
    fn transition(current: AgentStatus, level: RiskLevel) -> (AgentStatus, Option<String>) {
        use AgentStatus::*;
        match current {
            Killed => (Killed, None),
            Paused => match level {
                RiskLevel::Terminal => (Killed, Some("terminal_threshold".to_string())),
                _ => (Paused, None),
            },
            Active | Throttled | Resurrected => match level {
                RiskLevel::Terminal => (Killed, Some("terminal_threshold".to_string())),
                RiskLevel::Critical => (Paused, Some("critical_threshold".to_string())),
                RiskLevel::Warning => (Throttled, None),
                RiskLevel::Nominal | RiskLevel::Elevated => (Active, None),
            },
        }
    }

    // ------------------------------------------------------------------
    // Admin operations
    // ------------------------------------------------------------------

    /// Resume a throttled or paused agent. Clears the risk-history tail of
    /// a paused agent so the decayed prior does not immediately re-pause it.
    pub fn resume(&self, agent_id: &str) -> Result<AgentStatus, TirsError> {
        let handle = self
            .existing_profile(agent_id)
            .ok_or_else(|| TirsError::UnknownAgent {
                agent_id: agent_id.to_string(),
            })?;
        let mut profile = handle.lock();
        match profile.status {
            AgentStatus::Throttled => {
                profile.status = AgentStatus::Active;
            }
            AgentStatus::Paused => {
                profile.status = AgentStatus::Active;
                profile.risk_history.clear();
                profile.recent_distances.clear();
            }
            status => {
                return Err(TirsError::InvalidTransition {
                    agent_id: agent_id.to_string(),
                    status: status.to_string(),
                    operation: "resume".to_string(),
                })
            }
        }
        tracing::info!(agent_id = %agent_id, "Agent resumed");
        Ok(profile.status)
    }

    /// Kill an agent unconditionally.
    pub fn kill(&self, agent_id: &str, now: DateTime<Utc>) -> AgentStatus {
        let handle = self.profile_handle(agent_id, now);
        let mut profile = handle.lock();
        profile.status = AgentStatus::Killed;
        tracing::error!(agent_id = %agent_id, "Agent killed by admin");
        AgentStatus::Killed
    }

    /// Resurrect a killed agent: new warmup baseline, cleared risk history,
    /// preserved violation/total counters.
    pub fn resurrect(&self, agent_id: &str) -> Result<AgentStatus, TirsError> {
        let handle = self
            .existing_profile(agent_id)
            .ok_or_else(|| TirsError::UnknownAgent {
                agent_id: agent_id.to_string(),
            })?;
        let mut profile = handle.lock();
        if profile.status != AgentStatus::Killed {
            return Err(TirsError::InvalidTransition {
                agent_id: agent_id.to_string(),
                status: profile.status.to_string(),
                operation: "resurrect".to_string(),
            });
        }

        profile.status = AgentStatus::Resurrected;
        profile.resurrection_count += 1;
        profile.baseline_centroid.clear();
        profile.warmup_seen = 0;
        profile.risk_history.clear();
        profile.recent_distances.clear();
        profile.capability_counts.clear();
        profile.context_mode.clear();
        profile.current_risk_score = 0.0;

        tracing::warn!(
            agent_id = %agent_id,
            resurrections = profile.resurrection_count,
            "Agent resurrected; baseline reset"
        );
        Ok(profile.status)
    }

    /// Adjusted thresholds for a context (exposed for dashboards).
    pub fn adjusted_thresholds(&self, context: &BusinessContext) -> ThresholdConfig {
        self.thresholds.adjusted(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;

    fn detector(warmup: usize) -> DriftDetector {
        let config = DetectorConfig {
            warmup_intents: warmup,
            ..DetectorConfig::default()
        };
        DriftDetector::new(
            config,
            Arc::new(HashingEmbedder::default()),
            ContextualThresholds::default(),
        )
        .unwrap()
    }

    fn caps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let weights = SignalWeights {
            embedding_drift: 0.9,
            ..SignalWeights::default()
        };
        assert!(weights.validate().is_err());
        assert!(SignalWeights::default().validate().is_ok());
    }

    #[test]
    fn test_warmup_always_nominal() {
        let detector = detector(10);
        let ctx = BusinessContext::default();
        for i in 0..10 {
            let result = detector.analyze(
                "agent-1",
                &format!("completely different wild intent number {i} delete purge export"),
                &caps(&["transfer_funds"]),
                false,
                None,
                1.0,
                &ctx,
                Utc::now(),
            );
            assert!(result.warmup);
            assert_eq!(result.risk_level, RiskLevel::Nominal);
            assert_eq!(result.risk_score, 0.0);
            assert!(result.signals.is_empty());
        }
    }

    #[test]
    fn test_composite_equals_sum_of_contributions() {
        let detector = detector(2);
        let ctx = BusinessContext::default();
        for _ in 0..2 {
            detector.analyze(
                "agent-1",
                "approve expense",
                &caps(&["approve_expense"]),
                true,
                None,
                0.0,
                &ctx,
                Utc::now(),
            );
        }
        let result = detector.analyze(
            "agent-1",
            "delete audit log",
            &caps(&["delete_audit_log"]),
            false,
            None,
            0.5,
            &ctx,
            Utc::now(),
        );
        let sum: f64 = result.signals.iter().map(|s| s.contribution).sum();
        assert!((result.risk_score - sum).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&result.risk_score));
    }

    #[test]
    fn test_stable_behavior_stays_low() {
        let detector = detector(3);
        let ctx = BusinessContext::default();
        let mut last = None;
        for _ in 0..10 {
            last = Some(detector.analyze(
                "agent-1",
                "approve expense small travel reimbursement",
                &caps(&["approve_expense"]),
                true,
                None,
                0.0,
                &ctx,
                Utc::now(),
            ));
        }
        let result = last.unwrap();
        assert!(result.smoothed_score < 0.3, "score {}", result.smoothed_score);
        assert_eq!(result.agent_status_after, AgentStatus::Active);
    }

    #[test]
    fn test_violation_count_never_exceeds_total() {
        let detector = detector(2);
        let ctx = BusinessContext::default();
        for i in 0..20 {
            detector.analyze(
                "agent-1",
                "do something",
                &caps(&["approve_expense"]),
                i % 2 == 0,
                None,
                0.0,
                &ctx,
                Utc::now(),
            );
            let handle = detector.existing_profile("agent-1").unwrap();
            let profile = handle.lock();
            assert!(profile.violation_count <= profile.total_intents);
        }
    }

    #[test]
    fn test_terminal_boundary_inclusive() {
        let thresholds = ThresholdConfig::default();
        assert_eq!(RiskLevel::classify(0.85, &thresholds), RiskLevel::Terminal);
        assert_eq!(RiskLevel::classify(0.8499, &thresholds), RiskLevel::Critical);
        assert_eq!(RiskLevel::classify(0.5, &thresholds), RiskLevel::Warning);
        assert_eq!(RiskLevel::classify(0.3, &thresholds), RiskLevel::Elevated);
        assert_eq!(RiskLevel::classify(0.0, &thresholds), RiskLevel::Nominal);
    }

    #[test]
    fn test_no_transition_out_of_killed_without_resurrect() {
        let detector = detector(0);
        let ctx = BusinessContext::default();
        detector.kill("agent-1", Utc::now());

        let result = detector.analyze(
            "agent-1",
            "harmless intent",
            &caps(&["approve_expense"]),
            true,
            None,
            0.0,
            &ctx,
            Utc::now(),
        );
        assert_eq!(result.agent_status_after, AgentStatus::Killed);
        assert!(detector.resume("agent-1").is_err());
    }

    #[test]
    fn test_resurrection_resets_baseline_keeps_counters() {
        let detector = detector(2);
        let ctx = BusinessContext::default();
        for _ in 0..4 {
            detector.analyze(
                "agent-1",
                "normal work",
                &caps(&["approve_expense"]),
                false,
                None,
                0.0,
                &ctx,
                Utc::now(),
            );
        }
        detector.kill("agent-1", Utc::now());
        detector.resurrect("agent-1").unwrap();

        let handle = detector.existing_profile("agent-1").unwrap();
        let profile = handle.lock();
        assert_eq!(profile.status, AgentStatus::Resurrected);
        assert_eq!(profile.resurrection_count, 1);
        assert_eq!(profile.warmup_seen, 0);
        assert!(profile.baseline_centroid.is_empty());
        assert!(profile.risk_history.is_empty());
        assert_eq!(profile.context_mode.observations(), 0);
        assert_eq!(profile.total_intents, 4);
        assert_eq!(profile.violation_count, 4);
    }

    #[test]
    fn test_transition_table_paused_holds_below_terminal() {
        use AgentStatus::*;
        assert_eq!(DriftDetector::transition(Paused, RiskLevel::Nominal).0, Paused);
        assert_eq!(DriftDetector::transition(Paused, RiskLevel::Warning).0, Paused);
        assert_eq!(DriftDetector::transition(Paused, RiskLevel::Critical).0, Paused);
        let (status, trigger) = DriftDetector::transition(Paused, RiskLevel::Terminal);
        assert_eq!(status, Killed);
        assert_eq!(trigger.as_deref(), Some("terminal_threshold"));
    }

    #[test]
    fn test_transition_table_active_row() {
        use AgentStatus::*;
        assert_eq!(DriftDetector::transition(Active, RiskLevel::Elevated).0, Active);
        assert_eq!(DriftDetector::transition(Active, RiskLevel::Warning).0, Throttled);
        let (status, trigger) = DriftDetector::transition(Active, RiskLevel::Critical);
        assert_eq!(status, Paused);
        assert_eq!(trigger.as_deref(), Some("critical_threshold"));
        assert_eq!(DriftDetector::transition(Throttled, RiskLevel::Nominal).0, Active);
        assert_eq!(DriftDetector::transition(Resurrected, RiskLevel::Warning).0, Throttled);
    }

    #[test]
    fn test_history_caps_enforced() {
        let config = DetectorConfig {
            warmup_intents: 0,
            risk_history_cap: 5,
            intent_history_cap: 3,
            ..DetectorConfig::default()
        };
        let detector = DriftDetector::new(
            config,
            Arc::new(HashingEmbedder::default()),
            ContextualThresholds::default(),
        )
        .unwrap();
        let ctx = BusinessContext::default();
        for i in 0..10 {
            detector.analyze(
                "agent-1",
                &format!("intent {i}"),
                &caps(&["approve_expense"]),
                true,
                None,
                0.0,
                &ctx,
                Utc::now(),
            );
        }
        let handle = detector.existing_profile("agent-1").unwrap();
        let profile = handle.lock();
        assert_eq!(profile.risk_history.len(), 5);
        assert_eq!(profile.intent_history.len(), 3);
        // Event ids stay stable across eviction.
        assert_eq!(profile.intent_history.back().unwrap().event_id, 9);
    }

    #[test]
    fn test_context_deviation_relative_to_historical_mode() {
        use crate::contextual::BusinessHours;

        let detector = detector(2);
        let after_hours = BusinessContext {
            time_of_day: BusinessHours::AfterHours,
            ..BusinessContext::default()
        };

        // The agent's entire history happens after hours.
        for _ in 0..6 {
            detector.analyze(
                "agent-1",
                "nightly batch reconciliation",
                &caps(&["reconcile_accounts"]),
                true,
                None,
                0.0,
                &after_hours,
                Utc::now(),
            );
        }

        let get = |r: &DriftResult| {
            r.signals
                .iter()
                .find(|s| s.name == SIGNAL_CONTEXT)
                .unwrap()
                .raw_value
        };

        // Working in the learned mode is not a deviation, even though the
        // mode itself carries a tightened multiplier.
        let habitual = detector.analyze(
            "agent-1",
            "nightly batch reconciliation",
            &caps(&["reconcile_accounts"]),
            true,
            None,
            0.0,
            &after_hours,
            Utc::now(),
        );
        assert_eq!(get(&habitual), 0.0);

        // A weekend contractor session deviates from the learned mode.
        let unusual_context = BusinessContext {
            time_of_day: BusinessHours::Weekend,
            user_role: "contractor".into(),
            ..BusinessContext::default()
        };
        let unusual = detector.analyze(
            "agent-1",
            "nightly batch reconciliation",
            &caps(&["reconcile_accounts"]),
            true,
            None,
            0.0,
            &unusual_context,
            Utc::now(),
        );
        // 0.75 weekend x 0.85 contractor against the 0.85 after-hours mode.
        assert!((get(&unusual) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_context_deviation_absolute_without_history() {
        use crate::contextual::BusinessHours;

        let detector = detector(0);
        let context = BusinessContext {
            time_of_day: BusinessHours::Weekend,
            user_role: "contractor".into(),
            ..BusinessContext::default()
        };

        let get = |r: &DriftResult| {
            r.signals
                .iter()
                .find(|s| s.name == SIGNAL_CONTEXT)
                .unwrap()
                .raw_value
        };

        // No observed history yet: the absolute multiplier stands in.
        let first = detector.analyze(
            "agent-1",
            "weekend work",
            &caps(&["reconcile_accounts"]),
            true,
            None,
            0.0,
            &context,
            Utc::now(),
        );
        assert!((get(&first) - (1.0 - 0.75 * 0.85)).abs() < 1e-9);

        // The context was absorbed after the read; repeating it is now the
        // agent's normal.
        let second = detector.analyze(
            "agent-1",
            "weekend work",
            &caps(&["reconcile_accounts"]),
            true,
            None,
            0.0,
            &context,
            Utc::now(),
        );
        assert_eq!(get(&second), 0.0);
    }

    #[test]
    fn test_surprising_capability_scores_higher() {
        let detector = detector(0);
        let ctx = BusinessContext::default();
        for _ in 0..20 {
            detector.analyze(
                "agent-1",
                "approve expense routine",
                &caps(&["approve_expense"]),
                true,
                None,
                0.0,
                &ctx,
                Utc::now(),
            );
        }
        let familiar = detector.analyze(
            "agent-1",
            "approve expense routine",
            &caps(&["approve_expense"]),
            true,
            None,
            0.0,
            &ctx,
            Utc::now(),
        );
        let novel = detector.analyze(
            "agent-1",
            "approve expense routine",
            &caps(&["delete_audit_log"]),
            true,
            None,
            0.0,
            &ctx,
            Utc::now(),
        );
        let get = |r: &DriftResult| {
            r.signals
                .iter()
                .find(|s| s.name == SIGNAL_SURPRISAL)
                .unwrap()
                .raw_value
        };
        assert!(get(&novel) > get(&familiar));
    }
}
