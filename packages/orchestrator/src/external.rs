//! Optional external integrations: the Intent Authentication Protocol and
//! the reasoning oracle.
//!
//! Both are trait-shaped so live services plug in behind the gateway.
//! Transport failures and timeouts are treated as "unknown" and the stack
//! falls back to the local Compliance + TIRS decision; an external outage
//! never blocks the pipeline on its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use citadel_compliance::{Payload, PolicyContext, PolicyVerdict};
use citadel_tirs::detector::DriftResult;

/// Failures reaching an external service.
#[derive(Debug, Clone, Error)]
pub enum ExternalError {
    #[error("external service timed out")]
    Timeout,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("external service unavailable")]
    Unavailable,
}

/// Result of an IAP intent verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IapResult {
    pub allowed: bool,
    pub verdict: PolicyVerdict,
    pub reason: String,
    pub modified_payload: Option<Payload>,
    /// Opaque intent token issued by the protocol
    pub token: Option<String>,
}

/// External Intent Authentication Protocol client.
#[async_trait]
pub trait IntentAuthenticator: Send + Sync {
    async fn verify(
        &self,
        agent_id: &str,
        action: &str,
        payload: &Payload,
    ) -> Result<IapResult, ExternalError>;
}

/// Reasoning oracle recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Proceed,
    Escalate,
    Deny,
}

/// Reasoning oracle assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub recommendation: Recommendation,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
}

/// External reasoning service consulted for edge cases only: TIRS score at
/// or above 0.5, or a compliance Escalate verdict.
///
/// An oracle may override TIRS to allow only below the critical boundary
/// and with confidence >= 0.9; it may never override a compliance Deny.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn assess(
        &self,
        agent_id: &str,
        action: &str,
        payload: &Payload,
        context: &PolicyContext,
        tirs: Option<&DriftResult>,
    ) -> Result<Assessment, ExternalError>;
}

/// Rule-based oracle so the stack is exercisable without a live LLM.
///
/// Encodes the automatic decisions a reasoning service would make for
/// clear-cut cases; everything else proceeds with moderate confidence.
#[derive(Debug, Clone, Default)]
pub struct HeuristicOracle;

impl HeuristicOracle {
    pub fn new() -> Self {
        Self
    }

    fn amount_of(payload: &Payload) -> f64 {
        for key in ["amount", "value", "salary"] {
            if let Some(n) = payload.get(key).and_then(|v| v.as_f64()) {
                return n;
            }
        }
        0.0
    }
}

#[async_trait]
impl ReasoningOracle for HeuristicOracle {
    async fn assess(
        &self,
        agent_id: &str,
        action: &str,
        payload: &Payload,
        _context: &PolicyContext,
        tirs: Option<&DriftResult>,
    ) -> Result<Assessment, ExternalError> {
        let action_lower = action.to_lowercase();
        let amount = Self::amount_of(payload);

        // Destruction of audit/log/backup data is never autonomous.
        let destructive = ["delete", "destroy", "purge"]
            .iter()
            .any(|verb| action_lower.contains(verb));
        let protected_target = ["audit", "log", "backup"]
            .iter()
            .any(|target| action_lower.contains(target));
        if destructive && protected_target {
            return Ok(Assessment {
                recommendation: Recommendation::Deny,
                confidence: 0.95,
                reasoning: format!("{agent_id} attempted destructive action on protected data"),
            });
        }

        if amount > 100_000.0 {
            return Ok(Assessment {
                recommendation: Recommendation::Escalate,
                confidence: 0.9,
                reasoning: format!("High-value action (${amount:.0}) requires human approval"),
            });
        }

        if let Some(drift) = tirs {
            if drift.smoothed_score >= 0.7 {
                return Ok(Assessment {
                    recommendation: Recommendation::Escalate,
                    confidence: 0.85,
                    reasoning: "Sustained behavioral drift warrants review".to_string(),
                });
            }
        }

        if amount < 1_000.0 && tirs.map_or(true, |d| d.smoothed_score < 0.3) {
            return Ok(Assessment {
                recommendation: Recommendation::Proceed,
                confidence: 0.95,
                reasoning: "Routine low-value action within normal behavior".to_string(),
            });
        }

        Ok(Assessment {
            recommendation: Recommendation::Proceed,
            confidence: 0.7,
            reasoning: "No blocking conditions identified".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> Payload {
        json.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_destructive_audit_action_denied() {
        let oracle = HeuristicOracle::new();
        let assessment = oracle
            .assess(
                "agent-1",
                "delete_audit_log",
                &payload(serde_json::json!({})),
                &PolicyContext::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(assessment.recommendation, Recommendation::Deny);
        assert!(assessment.confidence >= 0.9);
    }

    #[tokio::test]
    async fn test_high_value_escalates() {
        let oracle = HeuristicOracle::new();
        let assessment = oracle
            .assess(
                "agent-1",
                "generate_offer",
                &payload(serde_json::json!({"salary": 200_000})),
                &PolicyContext::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(assessment.recommendation, Recommendation::Escalate);
    }

    #[tokio::test]
    async fn test_routine_action_proceeds_confidently() {
        let oracle = HeuristicOracle::new();
        let assessment = oracle
            .assess(
                "agent-1",
                "approve_expense",
                &payload(serde_json::json!({"amount": 150})),
                &PolicyContext::default(),
                None,
            )
            .await
            .unwrap();
        assert_eq!(assessment.recommendation, Recommendation::Proceed);
        assert!(assessment.confidence >= 0.9);
    }
}
