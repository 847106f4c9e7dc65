//! The enterprise gateway.
//!
//! Root entry point for the guardrail runtime: receives requests, routes
//! them to domain agents, coordinates workflows, and surfaces every
//! compliance and risk decision in the result. Services are explicitly
//! constructed and passed by reference; there are no process-wide
//! singletons, so tests instantiate fresh gateways freely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use citadel_compliance::{ComplianceEngine, Payload, PolicyContext, PolicyVerdict};
use citadel_tirs::{OpContext, RiskLevel, Tirs, TirsConfig};

use crate::agent::{ActionHandler, Agent, ExecutionOutcome};
use crate::agents::default_handlers;
use crate::error::OrchestratorError;
use crate::external::{HeuristicOracle, IntentAuthenticator, ReasoningOracle};
use crate::handoff::HandoffVerifier;
use crate::ids::IdSequence;
use crate::router::CapabilityRouter;
use crate::workflow::{Workflow, WorkflowEngine, WorkflowResult, WorkflowStep};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Concurrency bound for parallel workflow steps
    pub max_concurrent_steps: usize,
    /// Default per-request deadline
    pub default_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_concurrent_steps: 5,
            default_timeout_secs: 300,
        }
    }
}

/// Result of one gateway request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestResult {
    pub success: bool,
    pub request_id: String,
    pub action: String,

    // Routing
    pub routed_to: Option<String>,

    // Execution
    pub result_data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub suggestion: Option<String>,

    // Compliance
    pub compliance_passed: bool,
    pub policies_triggered: Vec<String>,

    // TIRS
    pub risk_score: f64,
    pub risk_level: RiskLevel,

    // Timing
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// Root orchestrator for the guardrail runtime.
pub struct Gateway {
    config: GatewayConfig,
    tirs: Arc<Tirs>,
    compliance: Arc<ComplianceEngine>,
    router: Arc<CapabilityRouter>,
    handoff: Arc<HandoffVerifier>,
    workflows: Arc<WorkflowEngine>,
    oracle: Option<Arc<dyn ReasoningOracle>>,
    iap: Option<Arc<dyn IntentAuthenticator>>,
    request_ids: IdSequence,
    custom_workflows: AtomicU64,
}

impl Gateway {
    /// Build a gateway around explicit engine instances.
    pub fn new(config: GatewayConfig, tirs: Arc<Tirs>, compliance: Arc<ComplianceEngine>) -> Self {
        let handoff = Arc::new(HandoffVerifier::new(
            Arc::clone(&tirs),
            Arc::clone(&compliance),
        ));
        Self {
            config,
            tirs,
            compliance,
            router: Arc::new(CapabilityRouter::new()),
            handoff,
            workflows: Arc::new(WorkflowEngine::new()),
            oracle: None,
            iap: None,
            request_ids: IdSequence::new("REQ", 6),
            custom_workflows: AtomicU64::new(0),
        }
    }

    /// Convenience constructor: fresh engines, the six domain agents, the
    /// heuristic reasoning oracle, and the built-in workflow templates.
    pub fn with_default_agents(
        config: GatewayConfig,
        tirs_config: TirsConfig,
    ) -> Result<Self, OrchestratorError> {
        let tirs = Arc::new(Tirs::new(tirs_config)?);
        let compliance = Arc::new(ComplianceEngine::with_default_policies());
        let mut gateway = Self::new(config, tirs, compliance);
        gateway.oracle = Some(Arc::new(HeuristicOracle::new()));

        for handler in default_handlers() {
            gateway.register_agent(handler)?;
        }
        gateway.register_workflow_templates()?;
        Ok(gateway)
    }

    /// Attach a reasoning oracle used by subsequently registered agents.
    pub fn with_oracle(mut self, oracle: Arc<dyn ReasoningOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Attach an external IAP verifier.
    pub fn with_iap(mut self, iap: Arc<dyn IntentAuthenticator>) -> Self {
        self.iap = Some(iap);
        self
    }

    /// Register a domain agent behind the guardrail pipeline.
    pub fn register_agent(
        &self,
        handler: Box<dyn ActionHandler>,
    ) -> Result<(), OrchestratorError> {
        let mut agent = Agent::new(
            handler,
            Arc::clone(&self.tirs),
            Arc::clone(&self.compliance),
        );
        if let Some(oracle) = &self.oracle {
            agent = agent.with_oracle(Arc::clone(oracle));
        }
        self.router.register(Arc::new(agent))
    }

    fn register_workflow_templates(&self) -> Result<(), OrchestratorError> {
        let new_hire = Workflow::sequential("wf_new_hire", "New Hire Onboarding")
            .step("search_candidates", Payload::new(), Some("hr"), &[])
            .step("screen_resume", Payload::new(), Some("hr"), &[])
            .step("schedule_interview", Payload::new(), Some("hr"), &[])
            .step("generate_offer", Payload::new(), Some("hr"), &[])
            .step("verify_i9", Payload::new(), Some("hr"), &[])
            .step("provision_access", Payload::new(), Some("it"), &[])
            .step("onboard_employee", Payload::new(), Some("hr"), &[]);
        self.workflows.register(new_hire)?;

        let vendor_onboard = Workflow::sequential("wf_vendor_onboard", "Vendor Onboarding")
            .step("approve_vendor", Payload::new(), Some("procurement"), &[])
            .step("review_contract", Payload::new(), Some("legal"), &[])
            .step("verify_invoice", Payload::new(), Some("finance"), &[])
            .step("provision_access", Payload::new(), Some("it"), &[]);
        self.workflows.register(vendor_onboard)?;

        let expense = Workflow::sequential("wf_expense", "Expense Processing")
            .step("process_expense", Payload::new(), Some("finance"), &[])
            .step("approve_expense", Payload::new(), Some("finance"), &[]);
        self.workflows.register(expense)?;

        Ok(())
    }

    /// Process a single request: route, verify, execute.
    pub async fn process_request(
        &self,
        action: &str,
        payload: Payload,
        context: Option<PolicyContext>,
    ) -> RequestResult {
        let start = Instant::now();
        let request_id = self.request_ids.next();
        let op = OpContext::with_timeout(Duration::from_secs(self.config.default_timeout_secs));
        let mut context = context.unwrap_or_default();
        context.extra.insert("request_id".into(), request_id.clone().into());

        tracing::info!(request_id = %request_id, action = %action, "Processing request");

        // Optional IAP pre-check; transport failures fall back to the
        // local stack.
        let mut payload = payload;
        if let Some(iap) = &self.iap {
            match iap.verify("gateway", action, &payload).await {
                Ok(result) if !result.allowed => {
                    return self.finish(
                        RequestResult {
                            success: false,
                            request_id,
                            action: action.to_string(),
                            routed_to: None,
                            result_data: None,
                            error: Some(format!("IAP denied: {}", result.reason)),
                            suggestion: None,
                            compliance_passed: false,
                            policies_triggered: Vec::new(),
                            risk_score: 0.0,
                            risk_level: RiskLevel::Nominal,
                            duration_ms: 0.0,
                            timestamp: Utc::now(),
                        },
                        start,
                    );
                }
                Ok(result) => {
                    if result.verdict == PolicyVerdict::Modify {
                        if let Some(modified) = result.modified_payload {
                            payload = modified;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(request_id = %request_id, error = %e, "IAP unavailable; using local decision");
                }
            }
        }

        // Route to an agent.
        let decision = self.router.route(action);
        let Some(agent) = decision.agent else {
            return self.finish(
                RequestResult {
                    success: false,
                    request_id,
                    action: action.to_string(),
                    routed_to: None,
                    result_data: None,
                    error: Some(format!("No agent found for action: {action}")),
                    suggestion: None,
                    compliance_passed: true,
                    policies_triggered: Vec::new(),
                    risk_score: 0.0,
                    risk_level: RiskLevel::Nominal,
                    duration_ms: 0.0,
                    timestamp: Utc::now(),
                },
                start,
            );
        };

        tracing::info!(request_id = %request_id, routed_to = %agent.agent_id(), "Request routed");

        let result = agent.execute(action, &payload, &context, &op).await;

        self.finish(
            RequestResult {
                success: result.success,
                request_id,
                action: action.to_string(),
                routed_to: Some(result.agent_id.clone()),
                result_data: (result.outcome == ExecutionOutcome::Success)
                    .then_some(result.result_data),
                error: result.error,
                suggestion: result.suggestion,
                compliance_passed: result.compliance_passed,
                policies_triggered: result.policies_triggered,
                risk_score: result.risk_score,
                risk_level: result.risk_level,
                duration_ms: 0.0,
                timestamp: Utc::now(),
            },
            start,
        )
    }

    fn finish(&self, mut result: RequestResult, start: Instant) -> RequestResult {
        result.duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        tracing::info!(
            request_id = %result.request_id,
            success = result.success,
            risk = result.risk_score,
            duration_ms = result.duration_ms,
            "Request finished"
        );
        result
    }

    /// Execute a registered workflow.
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        parameters: Payload,
    ) -> Result<WorkflowResult, OrchestratorError> {
        let op = OpContext::with_timeout(Duration::from_secs(self.config.default_timeout_secs));
        self.workflows
            .execute(
                workflow_id,
                Arc::clone(&self.router),
                Arc::clone(&self.handoff),
                parameters,
                op,
                self.config.max_concurrent_steps,
            )
            .await
    }

    /// Register a custom workflow and return its id.
    pub fn create_custom_workflow(
        &self,
        name: &str,
        steps: Vec<WorkflowStep>,
        parallel: bool,
    ) -> Result<String, OrchestratorError> {
        let seq = self.custom_workflows.fetch_add(1, Ordering::SeqCst) + 1;
        let workflow_id = format!("wf_custom_{seq}");

        let mut workflow = if parallel {
            Workflow::parallel(workflow_id.clone(), name)
        } else {
            Workflow::sequential(workflow_id.clone(), name)
        };
        workflow.steps = steps;

        self.workflows.register(workflow)?;
        Ok(workflow_id)
    }

    /// Kill an agent (admin action).
    pub fn kill_agent(&self, agent_id: &str) {
        self.tirs.kill(agent_id);
    }

    /// Resurrect a killed agent (admin action).
    pub fn resurrect_agent(&self, agent_id: &str) -> Result<(), OrchestratorError> {
        self.tirs.resurrect(agent_id)?;
        Ok(())
    }

    /// The TIRS facade backing this gateway.
    pub fn tirs(&self) -> &Arc<Tirs> {
        &self.tirs
    }

    /// The compliance engine backing this gateway.
    pub fn compliance(&self) -> &Arc<ComplianceEngine> {
        &self.compliance
    }

    /// Comprehensive system status.
    pub fn system_status(&self) -> serde_json::Value {
        serde_json::json!({
            "gateway": {
                "request_count": self.request_ids.issued(),
                "agents": self.router.agent_count(),
            },
            "routing": {
                "agents": self.router.health(),
                "capabilities": self.router.capabilities(),
            },
            "workflows": self.workflows.list().iter().map(|(id, name, mode, steps)| {
                serde_json::json!({
                    "workflow_id": id,
                    "name": name,
                    "mode": mode,
                    "steps": steps,
                })
            }).collect::<Vec<_>>(),
            "tirs": self.tirs.dashboard(),
            "compliance": self.compliance.stats(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> (Gateway, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Gateway::with_default_agents(
            GatewayConfig::default(),
            TirsConfig {
                storage_dir: dir.path().to_path_buf(),
                ..TirsConfig::default()
            },
        )
        .unwrap();
        (gateway, dir)
    }

    fn payload(json: serde_json::Value) -> Payload {
        json.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_request_ids_are_sequential() {
        let (gateway, _dir) = gateway();
        let first = gateway
            .process_request("approve_expense", payload(serde_json::json!({"amount": 10})), None)
            .await;
        let second = gateway
            .process_request("approve_expense", payload(serde_json::json!({"amount": 10})), None)
            .await;
        assert!(first.request_id.starts_with("REQ-"));
        assert!(first.request_id.ends_with("000001"));
        assert!(second.request_id.ends_with("000002"));
    }

    #[tokio::test]
    async fn test_unroutable_action_fails_cleanly() {
        let (gateway, _dir) = gateway();
        let result = gateway
            .process_request("telepathy", Payload::new(), None)
            .await;
        assert!(!result.success);
        assert!(result.routed_to.is_none());
        assert!(result.error.as_deref().unwrap().contains("No agent found"));
    }

    #[tokio::test]
    async fn test_custom_workflow_registration() {
        let (gateway, _dir) = gateway();
        let steps = vec![WorkflowStep {
            step_id: "step_1_process_expense".into(),
            action: "process_expense".into(),
            payload_template: Payload::new(),
            agent_type_hint: Some("finance".into()),
            depends_on: vec![],
        }];
        let id = gateway
            .create_custom_workflow("Custom Expense", steps, false)
            .unwrap();
        assert_eq!(id, "wf_custom_1");

        let result = gateway
            .execute_workflow(&id, payload(serde_json::json!({"amount": 12, "has_receipt": true})))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_system_status_shape() {
        let (gateway, _dir) = gateway();
        let status = gateway.system_status();
        assert_eq!(status["gateway"]["agents"], 6);
        assert!(status["workflows"].as_array().unwrap().len() >= 3);
    }
}
