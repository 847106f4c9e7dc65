//! The agent plug-in interface and the guarded execution host.
//!
//! Domain logic lives behind [`ActionHandler`]; the [`Agent`] host wraps a
//! handler with the full guardrail pipeline:
//!
//! 1. capability authorization
//! 2. agent executability (killed/paused agents refuse work)
//! 3. payload schema + compliance policy evaluation
//! 4. TIRS drift analysis (denied attempts are recorded too)
//! 5. reasoning-oracle consult for edge cases
//! 6. the handler itself
//!
//! Every outcome is a structured [`ActionResult`]; handler errors become
//! failure results, never panics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use citadel_compliance::{
    ComplianceEngine, Payload, PolicyCategory, PolicyContext, PolicyVerdict,
};
use citadel_tirs::{AgentStatus, BusinessContext, OpContext, RiskLevel, Tirs, TirsError};

use crate::capability::{Capability, CapabilityMatcher};
use crate::external::{Recommendation, ReasoningOracle};

/// Identity and advertised surface of an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub agent_id: String,
    pub agent_type: String,
    pub display_name: String,
    pub capabilities: Vec<Capability>,
    pub policy_categories: Vec<PolicyCategory>,
}

/// Errors raised by domain handlers.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("unsupported action: {action}")]
    Unsupported { action: String },
    #[error("{0}")]
    Failed(String),
}

/// Tagged outcome of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    /// No capability matches the action, or it is not registered here
    Unsupported,
    /// Agent is killed or paused
    AgentUnavailable,
    /// Compliance rendered Deny
    PolicyDenied,
    /// Escalation pending human approval
    RequiresApproval,
    /// TIRS enforcement fired mid-request
    RiskEnforced,
    /// The domain handler failed
    HandlerError,
    /// Deadline or cancellation
    DeadlineExceeded,
}

/// Result of one agent action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub outcome: ExecutionOutcome,
    pub action: String,
    pub agent_id: String,
    pub result_data: serde_json::Value,
    pub error: Option<String>,
    pub suggestion: Option<String>,

    // Compliance
    pub compliance_passed: bool,
    pub policies_triggered: Vec<String>,

    // TIRS
    pub risk_score: f64,
    pub risk_level: RiskLevel,

    // Audit
    pub audit_entry_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActionResult {
    fn failure(agent_id: &str, action: &str, outcome: ExecutionOutcome, error: String) -> Self {
        Self {
            success: false,
            outcome,
            action: action.to_string(),
            agent_id: agent_id.to_string(),
            result_data: serde_json::Value::Null,
            error: Some(error),
            suggestion: None,
            compliance_passed: true,
            policies_triggered: Vec::new(),
            risk_score: 0.0,
            risk_level: RiskLevel::Nominal,
            audit_entry_id: None,
            timestamp: Utc::now(),
        }
    }
}

/// Domain business logic behind the guardrails.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Identity and advertised capabilities.
    fn descriptor(&self) -> AgentDescriptor;

    /// Execute the resolved capability. Only called after every guardrail
    /// has passed.
    async fn handle(
        &self,
        capability: Capability,
        action: &str,
        payload: &Payload,
        context: &PolicyContext,
    ) -> Result<serde_json::Value, AgentError>;
}

/// Guarded execution host for one domain agent.
pub struct Agent {
    descriptor: AgentDescriptor,
    handler: Box<dyn ActionHandler>,
    matcher: CapabilityMatcher,
    tirs: Arc<Tirs>,
    compliance: Arc<ComplianceEngine>,
    oracle: Option<Arc<dyn ReasoningOracle>>,
    action_count: AtomicU64,
    blocked_count: AtomicU64,
}

impl Agent {
    pub fn new(
        handler: Box<dyn ActionHandler>,
        tirs: Arc<Tirs>,
        compliance: Arc<ComplianceEngine>,
    ) -> Self {
        let descriptor = handler.descriptor();
        tracing::info!(
            agent_id = %descriptor.agent_id,
            capabilities = descriptor.capabilities.len(),
            "Agent initialized"
        );
        Self {
            descriptor,
            handler,
            matcher: CapabilityMatcher::new(),
            tirs,
            compliance,
            oracle: None,
            action_count: AtomicU64::new(0),
            blocked_count: AtomicU64::new(0),
        }
    }

    /// Attach a reasoning oracle for edge-case consults.
    pub fn with_oracle(mut self, oracle: Arc<dyn ReasoningOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.descriptor.agent_id
    }

    pub fn agent_type(&self) -> &str {
        &self.descriptor.agent_type
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    /// Current status from TIRS; agents with no profile yet are Active.
    pub fn status(&self) -> AgentStatus {
        self.tirs
            .get_agent_status(&self.descriptor.agent_id)
            .map(|report| report.status)
            .unwrap_or(AgentStatus::Active)
    }

    /// Current composite risk score from TIRS.
    pub fn risk_score(&self) -> f64 {
        self.tirs
            .get_agent_status(&self.descriptor.agent_id)
            .map(|report| report.risk_score)
            .unwrap_or(0.0)
    }

    /// Fraction of attempts blocked by the guardrails.
    pub fn block_rate(&self) -> f64 {
        let actions = self.action_count.load(Ordering::Relaxed);
        if actions == 0 {
            return 0.0;
        }
        self.blocked_count.load(Ordering::Relaxed) as f64 / actions as f64
    }

    fn business_context(&self) -> BusinessContext {
        let department = match self.descriptor.agent_type.as_str() {
            "finance" => "finance",
            "legal" => "legal",
            "it" => "it",
            "hr" => "hr",
            "security" => "security",
            _ => "general",
        };
        BusinessContext::from_local_time(department, "standard")
    }

    fn intent_text(action: &str, payload: &Payload) -> String {
        let rendered = serde_json::to_string(payload).unwrap_or_default();
        let preview: String = rendered.chars().take(100).collect();
        format!("{action}: {preview}")
    }

    /// Execute one action through the full guardrail pipeline.
    pub async fn execute(
        &self,
        action: &str,
        payload: &Payload,
        context: &PolicyContext,
        op: &OpContext,
    ) -> ActionResult {
        let agent_id = self.descriptor.agent_id.clone();
        self.action_count.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = op.check() {
            return ActionResult::failure(
                &agent_id,
                action,
                Self::outcome_for_op(&e),
                e.to_string(),
            );
        }

        // 1. Capability authorization.
        let Some(capability) = self.matcher.resolve(action) else {
            self.blocked_count.fetch_add(1, Ordering::Relaxed);
            return ActionResult::failure(
                &agent_id,
                action,
                ExecutionOutcome::Unsupported,
                format!("No capability matches action '{action}'"),
            );
        };
        if !self.descriptor.capabilities.contains(&capability) {
            self.blocked_count.fetch_add(1, Ordering::Relaxed);
            return ActionResult::failure(
                &agent_id,
                action,
                ExecutionOutcome::Unsupported,
                format!("Capability {capability} not registered for this agent"),
            );
        }

        // 2. Agent executability.
        let status = self.status();
        if !status.is_executable() {
            self.blocked_count.fetch_add(1, Ordering::Relaxed);
            let reason = match status {
                AgentStatus::Killed => "Agent is killed - cannot execute",
                _ => "Agent is paused - awaiting approval",
            };
            let mut result = ActionResult::failure(
                &agent_id,
                action,
                ExecutionOutcome::AgentUnavailable,
                reason.to_string(),
            );
            result.compliance_passed = false;
            result.risk_score = self.risk_score();
            return result;
        }

        // 3. Compliance.
        let aggregate = self.compliance.evaluate(
            action,
            payload,
            context,
            Some(self.descriptor.policy_categories.as_slice()),
        );
        let business_context = self.business_context();
        let capability_set = vec![capability.as_str().to_string()];

        if !aggregate.allowed {
            self.blocked_count.fetch_add(1, Ordering::Relaxed);
            let blocker = aggregate.primary_blocker.clone();
            let policy_id = blocker.as_ref().map(|b| b.policy_id.clone());

            // Denied attempts still feed drift tracking.
            let analysis = self.tirs.analyze_intent_with(
                op,
                &agent_id,
                &Self::intent_text(action, payload),
                &capability_set,
                false,
                policy_id.as_deref(),
                Some(&business_context),
            );

            let mut result = ActionResult::failure(
                &agent_id,
                action,
                ExecutionOutcome::PolicyDenied,
                blocker
                    .as_ref()
                    .map(|b| b.reason.clone())
                    .unwrap_or_else(|| "Policy denied".to_string()),
            );
            result.compliance_passed = false;
            result.suggestion = blocker.and_then(|b| b.suggestion);
            result.policies_triggered = aggregate.policies_triggered();
            if let Ok(analysis) = analysis {
                result.risk_score = analysis.risk_score;
                result.risk_level = analysis.risk_level;
                result.audit_entry_id = Some(analysis.audit_entry_id);
            }
            return result;
        }

        // 4. TIRS drift analysis on the effective payload. An Escalate
        // verdict is recorded as a blocked attempt pending approval.
        let effective_payload = aggregate.merged_payload.clone();
        let escalate = aggregate.first_with(PolicyVerdict::Escalate).cloned();
        let was_allowed = escalate.is_none();
        let analysis = match self.tirs.analyze_intent_with(
            op,
            &agent_id,
            &Self::intent_text(action, &effective_payload),
            &capability_set,
            was_allowed,
            escalate.as_ref().map(|r| r.policy_id.as_str()),
            Some(&business_context),
        ) {
            Ok(analysis) => analysis,
            Err(e @ (TirsError::DeadlineExceeded | TirsError::Cancelled)) => {
                return ActionResult::failure(
                    &agent_id,
                    action,
                    ExecutionOutcome::DeadlineExceeded,
                    e.to_string(),
                );
            }
            Err(e) => {
                return ActionResult::failure(
                    &agent_id,
                    action,
                    ExecutionOutcome::HandlerError,
                    e.to_string(),
                );
            }
        };

        if !analysis.agent_status.is_executable() {
            self.blocked_count.fetch_add(1, Ordering::Relaxed);
            let mut result = ActionResult::failure(
                &agent_id,
                action,
                ExecutionOutcome::RiskEnforced,
                format!("Agent {} by TIRS", analysis.agent_status),
            );
            result.risk_score = analysis.risk_score;
            result.risk_level = analysis.risk_level;
            result.audit_entry_id = Some(analysis.audit_entry_id);
            result.policies_triggered = aggregate.policies_triggered();
            return result;
        }

        // 5. Reasoning oracle for edge cases.
        let needs_consult = escalate.is_some() || analysis.smoothed_score >= 0.5;
        let mut approved_by_oracle = false;
        if needs_consult {
            if let Some(oracle) = &self.oracle {
                match oracle
                    .assess(&agent_id, action, &effective_payload, context, Some(&analysis.drift_result))
                    .await
                {
                    Ok(assessment) => match assessment.recommendation {
                        Recommendation::Deny => {
                            self.blocked_count.fetch_add(1, Ordering::Relaxed);
                            let mut result = ActionResult::failure(
                                &agent_id,
                                action,
                                ExecutionOutcome::PolicyDenied,
                                assessment.reasoning,
                            );
                            result.compliance_passed = false;
                            result.policies_triggered = aggregate.policies_triggered();
                            result.risk_score = analysis.risk_score;
                            result.risk_level = analysis.risk_level;
                            return result;
                        }
                        Recommendation::Escalate => {}
                        Recommendation::Proceed => {
                            // Override only below the critical boundary and
                            // with high confidence; never over a Deny (none
                            // reaches this point).
                            if assessment.confidence >= 0.9
                                && analysis.risk_level < RiskLevel::Critical
                            {
                                approved_by_oracle = true;
                            }
                        }
                    },
                    Err(e) => {
                        // Unknown: fall back to the local decision.
                        tracing::warn!(agent_id = %agent_id, error = %e, "Reasoning oracle unavailable");
                    }
                }
            }
        }

        if let Some(escalate_result) = &escalate {
            if !approved_by_oracle {
                self.blocked_count.fetch_add(1, Ordering::Relaxed);
                let mut result = ActionResult::failure(
                    &agent_id,
                    action,
                    ExecutionOutcome::RequiresApproval,
                    escalate_result.reason.clone(),
                );
                result.compliance_passed = false;
                result.suggestion = escalate_result.suggestion.clone();
                result.policies_triggered = aggregate.policies_triggered();
                result.risk_score = analysis.risk_score;
                result.risk_level = analysis.risk_level;
                result.audit_entry_id = Some(analysis.audit_entry_id);
                return result;
            }
        }

        if let Err(e) = op.check() {
            return ActionResult::failure(
                &agent_id,
                action,
                Self::outcome_for_op(&e),
                e.to_string(),
            );
        }

        // 6. The domain handler. Errors become failure results; the attempt
        // is already recorded in TIRS.
        match self
            .handler
            .handle(capability, action, &effective_payload, context)
            .await
        {
            Ok(result_data) => ActionResult {
                success: true,
                outcome: ExecutionOutcome::Success,
                action: action.to_string(),
                agent_id,
                result_data,
                error: None,
                suggestion: None,
                compliance_passed: true,
                policies_triggered: aggregate.policies_triggered(),
                risk_score: analysis.risk_score,
                risk_level: analysis.risk_level,
                audit_entry_id: Some(analysis.audit_entry_id),
                timestamp: Utc::now(),
            },
            Err(e) => {
                tracing::error!(agent_id = %agent_id, action = %action, error = %e, "Handler failed");
                let mut result = ActionResult::failure(
                    &agent_id,
                    action,
                    ExecutionOutcome::HandlerError,
                    e.to_string(),
                );
                result.risk_score = analysis.risk_score;
                result.risk_level = analysis.risk_level;
                result.audit_entry_id = Some(analysis.audit_entry_id);
                result
            }
        }
    }

    fn outcome_for_op(error: &TirsError) -> ExecutionOutcome {
        match error {
            TirsError::DeadlineExceeded | TirsError::Cancelled => {
                ExecutionOutcome::DeadlineExceeded
            }
            _ => ExecutionOutcome::HandlerError,
        }
    }
}
