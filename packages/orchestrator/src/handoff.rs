//! Inter-agent handoff verification.
//!
//! Every transfer of control between agents re-enters the guardrails:
//! compliance first, then TIRS under the receiving agent's identity. A
//! compliance Deny or a receiving agent in Paused/Killed blocks the
//! handoff; Modify rewrites the payload; Escalate marks it as requiring
//! approval. Each verification carries a stable `HO-` id for audit
//! correlation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use citadel_compliance::{ComplianceEngine, Payload, PolicyContext, PolicyVerdict};
use citadel_tirs::{Tirs, TirsError};

use crate::ids::IdSequence;

/// Result of one handoff verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffResult {
    pub allowed: bool,
    pub from_agent: String,
    pub to_agent: String,
    pub action: String,

    // Verification layers
    pub compliance_passed: bool,
    pub tirs_passed: bool,

    // Risk assessment
    pub risk_score: f64,
    pub risk_delta: f64,

    // Blocking info
    pub blocked_reason: Option<String>,
    pub blocked_policy: Option<String>,
    pub suggestion: Option<String>,

    // Modifications
    pub modified_payload: Option<Payload>,

    // Approval
    pub requires_approval: bool,
    pub approval_type: Option<String>,

    // Audit
    pub handoff_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Verifies agent-to-agent handoffs.
pub struct HandoffVerifier {
    tirs: Arc<Tirs>,
    compliance: Arc<ComplianceEngine>,
    ids: IdSequence,
}

impl HandoffVerifier {
    pub fn new(tirs: Arc<Tirs>, compliance: Arc<ComplianceEngine>) -> Self {
        Self {
            tirs,
            compliance,
            ids: IdSequence::new("HO", 4),
        }
    }

    /// Verify a handoff between agents.
    pub fn verify(
        &self,
        from_agent: &str,
        to_agent: &str,
        action: &str,
        payload: &Payload,
        context: &PolicyContext,
    ) -> Result<HandoffResult, TirsError> {
        let handoff_id = self.ids.next();

        let mut context = context.clone();
        context.extra.insert("from_agent".into(), from_agent.into());
        context.extra.insert("to_agent".into(), to_agent.into());
        context.extra.insert("handoff_id".into(), handoff_id.clone().into());

        // 1. Compliance over the full policy set.
        let aggregate = self.compliance.evaluate(action, payload, &context, None);

        if !aggregate.allowed {
            let blocker = aggregate.primary_blocker.clone();
            return Ok(HandoffResult {
                allowed: false,
                from_agent: from_agent.to_string(),
                to_agent: to_agent.to_string(),
                action: action.to_string(),
                compliance_passed: false,
                tirs_passed: true,
                risk_score: aggregate.total_risk_delta,
                risk_delta: aggregate.total_risk_delta,
                blocked_reason: Some(
                    blocker
                        .as_ref()
                        .map(|b| b.reason.clone())
                        .unwrap_or_else(|| "Policy denied".to_string()),
                ),
                blocked_policy: blocker.map(|b| b.policy_id),
                suggestion: aggregate.suggestions.first().cloned(),
                modified_payload: None,
                requires_approval: false,
                approval_type: None,
                handoff_id,
                timestamp: Utc::now(),
            });
        }

        let requires_approval = aggregate.verdict == PolicyVerdict::Escalate;
        let approval_type = requires_approval.then(|| Self::approval_type(action));

        let modified_payload = (aggregate.verdict == PolicyVerdict::Modify)
            .then(|| aggregate.merged_payload.clone());

        // 2. TIRS under the receiving agent's identity.
        let analysis = self.tirs.analyze_intent(
            to_agent,
            &format!("Handoff from {from_agent}: {action}"),
            &[action.to_string()],
            true,
            None,
            None,
        )?;

        if !analysis.agent_status.is_executable() {
            return Ok(HandoffResult {
                allowed: false,
                from_agent: from_agent.to_string(),
                to_agent: to_agent.to_string(),
                action: action.to_string(),
                compliance_passed: true,
                tirs_passed: false,
                risk_score: analysis.risk_score,
                risk_delta: aggregate.total_risk_delta,
                blocked_reason: Some(format!(
                    "Agent {to_agent} is {}",
                    analysis.agent_status
                )),
                blocked_policy: None,
                suggestion: None,
                modified_payload: None,
                requires_approval: false,
                approval_type: None,
                handoff_id,
                timestamp: Utc::now(),
            });
        }

        tracing::info!(
            handoff_id = %handoff_id,
            from = %from_agent,
            to = %to_agent,
            action = %action,
            "Handoff allowed"
        );

        Ok(HandoffResult {
            allowed: true,
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
            action: action.to_string(),
            compliance_passed: true,
            tirs_passed: true,
            risk_score: analysis.risk_score,
            risk_delta: aggregate.total_risk_delta,
            blocked_reason: None,
            blocked_policy: None,
            suggestion: aggregate.suggestions.first().cloned(),
            modified_payload,
            requires_approval,
            approval_type,
            handoff_id,
            timestamp: Utc::now(),
        })
    }

    /// Required approver type, keyed on the action.
    fn approval_type(action: &str) -> String {
        let action_lower = action.to_lowercase();
        if action_lower.contains("salary") || action_lower.contains("payment") {
            "finance"
        } else if action_lower.contains("contract") || action_lower.contains("nda") {
            "legal"
        } else if action_lower.contains("hire")
            || action_lower.contains("offer")
            || action_lower.contains("terminate")
        {
            "hr"
        } else if action_lower.contains("access") || action_lower.contains("security") {
            "security"
        } else {
            "manager"
        }
        .to_string()
    }
}
