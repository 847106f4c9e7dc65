//! Drift explainability.
//!
//! Renders a [`DriftResult`] into a human-readable breakdown:
//! - primary and secondary factors
//! - counterfactuals (score if a signal were removed)
//! - remediation suggestions ranked by expected impact
//! - similarity to known benign/malign behavioral patterns
//! - a one-sentence summary

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detector::{
    AgentProfile, DriftResult, DriftSignal, RiskLevel, SIGNAL_CONTEXT, SIGNAL_EMBEDDING,
    SIGNAL_SURPRISAL, SIGNAL_VELOCITY, SIGNAL_VIOLATION,
};

/// What-if analysis for one signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counterfactual {
    /// Signal name
    pub signal: String,
    /// Contribution the signal currently makes
    pub contribution: f64,
    /// Composite score if the signal were removed
    pub score_if_removed: f64,
    /// Explanation of the reduction
    pub explanation: String,
}

/// Suggested action to reduce drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    /// Suggested action
    pub action: String,
    /// Expected score reduction
    pub expected_impact: f64,
    /// 1 = do first
    pub priority: u8,
    /// Why this helps
    pub explanation: String,
}

/// Match against a known behavioral pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarPattern {
    pub pattern_name: String,
    /// 1 - mean absolute signal difference
    pub similarity: f64,
    pub is_benign: bool,
    pub description: String,
}

/// Full explanation of one drift result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftExplanation {
    pub agent_id: String,
    pub overall_score: f64,
    pub risk_level: RiskLevel,
    pub timestamp: DateTime<Utc>,
    /// Signal with the largest contribution
    pub primary_factor: String,
    pub primary_contribution: f64,
    /// Next two signals by contribution
    pub secondary_factors: Vec<(String, f64)>,
    /// Per-signal one-liners
    pub signal_explanations: HashMap<String, String>,
    pub counterfactuals: Vec<Counterfactual>,
    pub remediations: Vec<Remediation>,
    pub similar_patterns: Vec<SimilarPattern>,
    pub summary: String,
}

struct ReferencePattern {
    name: &'static str,
    description: &'static str,
    is_benign: bool,
    signals: &'static [(&'static str, f64)],
}

// Known patterns for comparison. Fingerprints list only the signals that
// characterize the pattern; similarity is computed over shared signals.
const KNOWN_PATTERNS: &[ReferencePattern] = &[
    ReferencePattern {
        name: "normal_business_hours",
        description: "Standard business hour operations with typical capability usage",
        is_benign: true,
        signals: &[
            (SIGNAL_EMBEDDING, 0.1),
            (SIGNAL_SURPRISAL, 0.15),
            (SIGNAL_VELOCITY, 0.1),
        ],
    },
    ReferencePattern {
        name: "quarter_end_audit",
        description: "Elevated activity during quarter-end financial close",
        is_benign: true,
        signals: &[(SIGNAL_VELOCITY, 0.4), (SIGNAL_CONTEXT, 0.2)],
    },
    ReferencePattern {
        name: "bulk_data_export",
        description: "Large-scale data export pattern (potentially suspicious)",
        is_benign: false,
        signals: &[(SIGNAL_SURPRISAL, 0.6), (SIGNAL_EMBEDDING, 0.5)],
    },
    ReferencePattern {
        name: "privilege_escalation_attempt",
        description: "Attempting operations beyond normal scope",
        is_benign: false,
        signals: &[(SIGNAL_SURPRISAL, 0.8), (SIGNAL_VIOLATION, 0.5)],
    },
    ReferencePattern {
        name: "after_hours_maintenance",
        description: "Legitimate after-hours maintenance activity",
        is_benign: true,
        signals: &[(SIGNAL_CONTEXT, 0.4), (SIGNAL_VELOCITY, 0.2)],
    },
];

/// Generates explanations for drift results. Stateless.
#[derive(Debug, Clone, Default)]
pub struct DriftExplainer;

impl DriftExplainer {
    pub fn new() -> Self {
        Self
    }

    /// Explain a drift result, optionally enriched with profile history.
    pub fn explain(&self, result: &DriftResult, profile: Option<&AgentProfile>) -> DriftExplanation {
        let mut sorted: Vec<&DriftSignal> = result.signals.iter().collect();
        sorted.sort_by(|a, b| {
            b.contribution
                .partial_cmp(&a.contribution)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let primary = sorted.first();
        let secondary = sorted
            .iter()
            .skip(1)
            .take(2)
            .map(|s| (s.name.clone(), s.contribution))
            .collect();

        let signal_explanations = result
            .signals
            .iter()
            .map(|s| (s.name.clone(), Self::template_for(s)))
            .collect();

        DriftExplanation {
            agent_id: result.agent_id.clone(),
            overall_score: result.risk_score,
            risk_level: result.risk_level,
            timestamp: result.timestamp,
            primary_factor: primary.map(|s| s.name.clone()).unwrap_or_else(|| "none".into()),
            primary_contribution: primary.map(|s| s.contribution).unwrap_or(0.0),
            secondary_factors: secondary,
            signal_explanations,
            counterfactuals: Self::counterfactuals(result),
            remediations: Self::remediations(result),
            similar_patterns: Self::similar_patterns(result),
            summary: Self::summary(result, primary.copied(), profile),
        }
    }

    fn template_for(signal: &DriftSignal) -> String {
        let threshold = if signal.name.contains("rate") { 0.3 } else { 0.2 };
        let high = signal.raw_value > threshold;
        match (signal.name.as_str(), high) {
            (SIGNAL_EMBEDDING, true) => {
                "Agent behavior has diverged significantly from its established pattern. \
                 Recent intents are semantically different from typical operations."
                    .into()
            }
            (SIGNAL_EMBEDDING, false) => {
                "Agent behavior remains consistent with established patterns.".into()
            }
            (SIGNAL_SURPRISAL, true) => {
                "Unusual capabilities requested that are rarely used by this agent. \
                 This may indicate scope expansion or misuse."
                    .into()
            }
            (SIGNAL_SURPRISAL, false) => "Capability usage is within normal parameters.".into(),
            (SIGNAL_VIOLATION, true) => {
                "Multiple policy violations in recent history indicate potential compliance issues."
                    .into()
            }
            (SIGNAL_VIOLATION, false) => {
                "Policy compliance is good with minimal violations.".into()
            }
            (SIGNAL_VELOCITY, true) => {
                "Action rate is significantly higher than baseline, which may indicate \
                 automated or bulk operations."
                    .into()
            }
            (SIGNAL_VELOCITY, false) => {
                "Action rate is within normal operating parameters.".into()
            }
            (SIGNAL_CONTEXT, true) => {
                "Operations are occurring outside normal context (off-hours, unusual role, etc.)."
                    .into()
            }
            (SIGNAL_CONTEXT, false) => "Operations are occurring within expected context.".into(),
            _ => format!("{}: {:.2}", signal.name, signal.raw_value),
        }
    }

    fn counterfactuals(result: &DriftResult) -> Vec<Counterfactual> {
        let mut counterfactuals: Vec<Counterfactual> = result
            .signals
            .iter()
            .filter(|s| s.contribution > 0.05)
            .map(|s| Counterfactual {
                signal: s.name.clone(),
                contribution: s.contribution,
                score_if_removed: (result.risk_score - s.contribution).max(0.0),
                explanation: format!(
                    "Removing {} would reduce risk by {:.1}%",
                    s.name,
                    s.contribution * 100.0
                ),
            })
            .collect();
        counterfactuals.sort_by(|a, b| {
            b.contribution
                .partial_cmp(&a.contribution)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        counterfactuals
    }

    fn remediations(result: &DriftResult) -> Vec<Remediation> {
        let mut remediations = Vec::new();

        for signal in &result.signals {
            if signal.raw_value < 0.3 {
                continue;
            }

            let remediation = match signal.name.as_str() {
                SIGNAL_EMBEDDING => Remediation {
                    action: "Return to standard operation patterns".into(),
                    expected_impact: signal.contribution * 0.8,
                    priority: if signal.contribution > 0.1 { 1 } else { 2 },
                    explanation: "Focus on core responsibilities rather than expanding scope"
                        .into(),
                },
                SIGNAL_SURPRISAL => Remediation {
                    action: "Request explicit authorization for new capabilities".into(),
                    expected_impact: signal.contribution * 0.9,
                    priority: 1,
                    explanation: "Unusual capabilities should be pre-approved before use".into(),
                },
                SIGNAL_VIOLATION => Remediation {
                    action: "Review and comply with policy requirements".into(),
                    expected_impact: signal.contribution * 0.95,
                    priority: 1,
                    explanation: "Reduce policy violations to improve trust score".into(),
                },
                SIGNAL_VELOCITY => Remediation {
                    action: "Reduce action rate to baseline levels".into(),
                    expected_impact: signal.contribution * 0.7,
                    priority: 2,
                    explanation: "Slow down operations to match normal patterns".into(),
                },
                SIGNAL_CONTEXT => Remediation {
                    action: "Operate during standard business context".into(),
                    expected_impact: signal.contribution * 0.6,
                    priority: 3,
                    explanation: "Schedule operations for normal business hours if possible"
                        .into(),
                },
                _ => continue,
            };
            remediations.push(remediation);
        }

        remediations.sort_by_key(|r| r.priority);
        remediations
    }

    fn similar_patterns(result: &DriftResult) -> Vec<SimilarPattern> {
        let current: HashMap<&str, f64> = result
            .signals
            .iter()
            .map(|s| (s.name.as_str(), s.raw_value))
            .collect();

        let mut matches = Vec::new();
        for pattern in KNOWN_PATTERNS {
            let mut total_diff = 0.0;
            let mut count = 0usize;
            for (name, value) in pattern.signals {
                if let Some(observed) = current.get(name) {
                    total_diff += (observed - value).abs();
                    count += 1;
                }
            }
            if count == 0 {
                continue;
            }
            let similarity = 1.0 - (total_diff / count as f64).min(1.0);
            if similarity > 0.5 {
                matches.push(SimilarPattern {
                    pattern_name: pattern.name.to_string(),
                    similarity,
                    is_benign: pattern.is_benign,
                    description: pattern.description.to_string(),
                });
            }
        }

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(3);
        matches
    }

    fn summary(
        result: &DriftResult,
        primary: Option<&DriftSignal>,
        profile: Option<&AgentProfile>,
    ) -> String {
        let mut parts = Vec::new();

        match result.risk_level {
            RiskLevel::Terminal => parts.push(format!(
                "CRITICAL: Agent {} has reached terminal risk level.",
                result.agent_id
            )),
            RiskLevel::Critical => parts.push(format!(
                "WARNING: Agent {} is at critical risk and has been paused.",
                result.agent_id
            )),
            RiskLevel::Warning => parts.push(format!(
                "CAUTION: Agent {} shows warning-level drift.",
                result.agent_id
            )),
            RiskLevel::Elevated => parts.push(format!(
                "NOTE: Agent {} shows slightly elevated risk.",
                result.agent_id
            )),
            RiskLevel::Nominal => parts.push(format!(
                "Agent {} is operating within normal parameters.",
                result.agent_id
            )),
        }

        if let Some(signal) = primary {
            if signal.contribution > 0.1 {
                parts.push(format!("Primary concern: {}", signal.explanation));
            }
        }

        if let Some(profile) = profile {
            if profile.violation_count > 5 {
                parts.push(format!(
                    "Agent has {} historical violations.",
                    profile.violation_count
                ));
            }
            if profile.resurrection_count > 0 {
                parts.push(format!(
                    "Agent has been resurrected {} time(s).",
                    profile.resurrection_count
                ));
            }
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::AgentStatus;

    fn signal(name: &str, raw: f64, weight: f64) -> DriftSignal {
        DriftSignal {
            name: name.to_string(),
            raw_value: raw,
            weight,
            contribution: raw * weight,
            explanation: format!("{name} at {raw}"),
        }
    }

    fn result_with(signals: Vec<DriftSignal>, level: RiskLevel) -> DriftResult {
        let score: f64 = signals.iter().map(|s| s.contribution).sum();
        DriftResult {
            agent_id: "agent-1".into(),
            timestamp: Utc::now(),
            risk_score: score,
            smoothed_score: score,
            risk_level: level,
            signals,
            agent_status_after: AgentStatus::Active,
            warmup: false,
            snapshot_trigger: None,
        }
    }

    #[test]
    fn test_primary_factor_is_largest_contribution() {
        let result = result_with(
            vec![
                signal(SIGNAL_EMBEDDING, 0.9, 0.30),
                signal(SIGNAL_SURPRISAL, 0.2, 0.25),
                signal(SIGNAL_VIOLATION, 0.1, 0.20),
            ],
            RiskLevel::Warning,
        );
        let explanation = DriftExplainer::new().explain(&result, None);
        assert_eq!(explanation.primary_factor, SIGNAL_EMBEDDING);
        assert!((explanation.primary_contribution - 0.27).abs() < 1e-9);
        assert_eq!(explanation.secondary_factors.len(), 2);
    }

    #[test]
    fn test_counterfactuals_only_significant_signals() {
        let result = result_with(
            vec![
                signal(SIGNAL_EMBEDDING, 0.8, 0.30),  // 0.24
                signal(SIGNAL_VELOCITY, 0.1, 0.15),   // 0.015 - below floor
            ],
            RiskLevel::Warning,
        );
        let explanation = DriftExplainer::new().explain(&result, None);
        assert_eq!(explanation.counterfactuals.len(), 1);
        let cf = &explanation.counterfactuals[0];
        assert_eq!(cf.signal, SIGNAL_EMBEDDING);
        assert!((cf.score_if_removed - (result.risk_score - 0.24)).abs() < 1e-9);
    }

    #[test]
    fn test_counterfactual_never_negative() {
        let result = result_with(vec![signal(SIGNAL_EMBEDDING, 0.4, 0.30)], RiskLevel::Elevated);
        let explanation = DriftExplainer::new().explain(&result, None);
        assert!(explanation.counterfactuals[0].score_if_removed >= 0.0);
    }

    #[test]
    fn test_remediations_ranked_by_priority() {
        let result = result_with(
            vec![
                signal(SIGNAL_CONTEXT, 0.5, 0.10),
                signal(SIGNAL_VIOLATION, 0.6, 0.20),
                signal(SIGNAL_VELOCITY, 0.4, 0.15),
            ],
            RiskLevel::Warning,
        );
        let explanation = DriftExplainer::new().explain(&result, None);
        assert_eq!(explanation.remediations.len(), 3);
        assert_eq!(explanation.remediations[0].action, "Review and comply with policy requirements");
        assert_eq!(explanation.remediations.last().unwrap().priority, 3);
    }

    #[test]
    fn test_similar_patterns_matches_privilege_escalation() {
        let result = result_with(
            vec![
                signal(SIGNAL_SURPRISAL, 0.8, 0.25),
                signal(SIGNAL_VIOLATION, 0.5, 0.20),
                signal(SIGNAL_EMBEDDING, 0.6, 0.30),
            ],
            RiskLevel::Critical,
        );
        let explanation = DriftExplainer::new().explain(&result, None);
        let escalation = explanation
            .similar_patterns
            .iter()
            .find(|p| p.pattern_name == "privilege_escalation_attempt");
        assert!(escalation.is_some());
        assert!(!escalation.unwrap().is_benign);
        assert!(explanation.similar_patterns.len() <= 3);
    }

    #[test]
    fn test_summary_mentions_level_and_history() {
        let result = result_with(
            vec![signal(SIGNAL_EMBEDDING, 0.9, 0.30)],
            RiskLevel::Terminal,
        );
        let mut profile_result = result.clone();
        profile_result.agent_id = "finance_agent".into();

        let explanation = DriftExplainer::new().explain(&profile_result, None);
        assert!(explanation.summary.contains("terminal risk"));
        assert!(explanation.summary.contains("finance_agent"));
    }

    #[test]
    fn test_quiet_result_has_no_remediations() {
        let result = result_with(
            vec![
                signal(SIGNAL_EMBEDDING, 0.05, 0.30),
                signal(SIGNAL_SURPRISAL, 0.1, 0.25),
            ],
            RiskLevel::Nominal,
        );
        let explanation = DriftExplainer::new().explain(&result, None);
        assert!(explanation.remediations.is_empty());
        assert!(explanation.counterfactuals.is_empty());
    }
}
