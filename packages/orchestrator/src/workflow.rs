//! Workflow execution.
//!
//! A workflow is a DAG of steps executed across agents. Sequential
//! workflows run in declared order with each step's result visible to the
//! next; parallel workflows run dependency-ordered waves under a bounded
//! concurrency limit. Every step re-enters the guardrails through the
//! handoff verifier before its agent executes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use citadel_compliance::{Payload, PolicyContext};
use citadel_tirs::OpContext;

use crate::error::OrchestratorError;
use crate::handoff::HandoffVerifier;
use crate::router::CapabilityRouter;

/// Execution shape of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    Sequential,
    Parallel,
}

/// One step of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_id: String,
    pub action: String,
    /// Per-step payload defaults; runtime parameters overlay these
    pub payload_template: Payload,
    /// Preferred agent type; falls back to capability routing
    pub agent_type_hint: Option<String>,
    /// Step ids that must complete successfully first (parallel mode)
    pub depends_on: Vec<String>,
}

/// A registered workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub name: String,
    pub mode: WorkflowMode,
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn sequential(workflow_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            name: name.into(),
            mode: WorkflowMode::Sequential,
            steps: Vec::new(),
        }
    }

    pub fn parallel(workflow_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            name: name.into(),
            mode: WorkflowMode::Parallel,
            steps: Vec::new(),
        }
    }

    /// Append a step; the step id is derived from its position and action.
    pub fn step(
        mut self,
        action: impl Into<String>,
        payload_template: Payload,
        agent_type_hint: Option<&str>,
        depends_on: &[&str],
    ) -> Self {
        let action = action.into();
        let step_id = format!("step_{}_{}", self.steps.len() + 1, action);
        self.steps.push(WorkflowStep {
            step_id,
            action,
            payload_template,
            agent_type_hint: agent_type_hint.map(str::to_string),
            depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        });
        self
    }
}

/// Result of one workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub action: String,
    pub agent_id: Option<String>,
    pub success: bool,
    pub result_data: serde_json::Value,
    pub error: Option<String>,
    pub handoff_id: Option<String>,
    pub duration_ms: f64,
}

impl StepResult {
    fn failure(step: &WorkflowStep, error: String) -> Self {
        Self {
            step_id: step.step_id.clone(),
            action: step.action.clone(),
            agent_id: None,
            success: false,
            result_data: serde_json::Value::Null,
            error: Some(error),
            handoff_id: None,
            duration_ms: 0.0,
        }
    }
}

/// Result of a workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub workflow_id: String,
    pub success: bool,
    pub step_results: Vec<StepResult>,
    pub duration_ms: f64,
}

/// Registry and executor for workflows.
pub struct WorkflowEngine {
    workflows: RwLock<HashMap<String, Arc<Workflow>>>,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
        }
    }

    /// Register a workflow after validating its step graph.
    ///
    /// Dependencies must reference previously declared steps, which keeps
    /// the graph acyclic by construction.
    pub fn register(&self, workflow: Workflow) -> Result<(), OrchestratorError> {
        let mut seen: Vec<&str> = Vec::new();
        for step in &workflow.steps {
            if seen.contains(&step.step_id.as_str()) {
                return Err(OrchestratorError::InvalidWorkflow {
                    workflow_id: workflow.workflow_id.clone(),
                    reason: format!("duplicate step id {}", step.step_id),
                });
            }
            for dep in &step.depends_on {
                if dep == &step.step_id {
                    return Err(OrchestratorError::InvalidWorkflow {
                        workflow_id: workflow.workflow_id.clone(),
                        reason: format!("step {} depends on itself", step.step_id),
                    });
                }
                if !seen.contains(&dep.as_str()) {
                    return Err(OrchestratorError::InvalidWorkflow {
                        workflow_id: workflow.workflow_id.clone(),
                        reason: format!(
                            "step {} depends on unknown or later step {dep}",
                            step.step_id
                        ),
                    });
                }
            }
            seen.push(&step.step_id);
        }

        let mut workflows = self.workflows.write();
        if workflows.contains_key(&workflow.workflow_id) {
            return Err(OrchestratorError::DuplicateWorkflow {
                workflow_id: workflow.workflow_id,
            });
        }
        tracing::info!(
            workflow_id = %workflow.workflow_id,
            steps = workflow.steps.len(),
            mode = ?workflow.mode,
            "Workflow registered"
        );
        workflows.insert(workflow.workflow_id.clone(), Arc::new(workflow));
        Ok(())
    }

    pub fn get(&self, workflow_id: &str) -> Option<Arc<Workflow>> {
        self.workflows.read().get(workflow_id).cloned()
    }

    /// Registered workflow summaries.
    pub fn list(&self) -> Vec<(String, String, WorkflowMode, usize)> {
        self.workflows
            .read()
            .values()
            .map(|w| (w.workflow_id.clone(), w.name.clone(), w.mode, w.steps.len()))
            .collect()
    }

    /// Execute a registered workflow.
    pub async fn execute(
        &self,
        workflow_id: &str,
        router: Arc<CapabilityRouter>,
        handoff: Arc<HandoffVerifier>,
        parameters: Payload,
        op: OpContext,
        max_concurrent: usize,
    ) -> Result<WorkflowResult, OrchestratorError> {
        let workflow = self
            .get(workflow_id)
            .ok_or_else(|| OrchestratorError::UnknownWorkflow {
                workflow_id: workflow_id.to_string(),
            })?;

        let start = Instant::now();
        tracing::info!(workflow_id = %workflow_id, mode = ?workflow.mode, "Workflow started");

        let step_results = match workflow.mode {
            WorkflowMode::Sequential => {
                Self::run_sequential(&workflow, &router, &handoff, &parameters, &op).await
            }
            WorkflowMode::Parallel => {
                Self::run_parallel(&workflow, &router, &handoff, &parameters, &op, max_concurrent)
                    .await
            }
        };

        let success = step_results.len() == workflow.steps.len()
            && step_results.iter().all(|r| r.success);

        let result = WorkflowResult {
            workflow_id: workflow_id.to_string(),
            success,
            step_results,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        };

        tracing::info!(
            workflow_id = %workflow_id,
            success = result.success,
            steps = result.step_results.len(),
            duration_ms = result.duration_ms,
            "Workflow finished"
        );
        Ok(result)
    }

    async fn run_sequential(
        workflow: &Workflow,
        router: &Arc<CapabilityRouter>,
        handoff: &Arc<HandoffVerifier>,
        parameters: &Payload,
        op: &OpContext,
    ) -> Vec<StepResult> {
        let mut results = Vec::new();
        let mut from_agent = "gateway".to_string();
        let mut shared_results = Payload::new();

        for step in &workflow.steps {
            if op.check().is_err() {
                results.push(StepResult::failure(step, "workflow cancelled".to_string()));
                break;
            }

            let mut context = PolicyContext::default();
            context.extra.insert("workflow_id".into(), workflow.workflow_id.clone().into());
            context
                .extra
                .insert("step_results".into(), serde_json::Value::Object(shared_results.clone()));

            let result =
                Self::run_step(step, router, handoff, parameters, &from_agent, &context, op).await;

            let succeeded = result.success;
            if let Some(agent_id) = &result.agent_id {
                from_agent = agent_id.clone();
            }
            shared_results.insert(step.step_id.clone(), result.result_data.clone());
            results.push(result);

            // Sequential workflows abort on the first failure.
            if !succeeded {
                break;
            }
        }

        results
    }

    async fn run_parallel(
        workflow: &Arc<Workflow>,
        router: &Arc<CapabilityRouter>,
        handoff: &Arc<HandoffVerifier>,
        parameters: &Payload,
        op: &OpContext,
        max_concurrent: usize,
    ) -> Vec<StepResult> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut completed: HashMap<String, StepResult> = HashMap::new();
        let mut failed = false;

        let mut pending: Vec<usize> = (0..workflow.steps.len()).collect();

        while !pending.is_empty() {
            if failed || op.check().is_err() {
                // Cancel everything not yet started; in-flight steps have
                // already drained at the wave boundary.
                for index in &pending {
                    let step = &workflow.steps[*index];
                    completed.insert(
                        step.step_id.clone(),
                        StepResult::failure(step, "cancelled: upstream failure".to_string()),
                    );
                }
                break;
            }

            let runnable: Vec<usize> = pending
                .iter()
                .copied()
                .filter(|index| {
                    workflow.steps[*index]
                        .depends_on
                        .iter()
                        .all(|dep| completed.get(dep).is_some_and(|r| r.success))
                })
                .collect();

            if runnable.is_empty() {
                // Remaining steps depend on failed or unreachable work.
                for index in &pending {
                    let step = &workflow.steps[*index];
                    completed.insert(
                        step.step_id.clone(),
                        StepResult::failure(step, "cancelled: dependency not satisfied".to_string()),
                    );
                }
                break;
            }

            let mut join_set = JoinSet::new();
            for index in &runnable {
                let step = workflow.steps[*index].clone();
                let router = Arc::clone(router);
                let handoff = Arc::clone(handoff);
                let parameters = parameters.clone();
                let semaphore = Arc::clone(&semaphore);
                let op = op.child();
                let workflow_id = workflow.workflow_id.clone();

                join_set.spawn(async move {
                    // Closed only if the semaphore is dropped, which cannot
                    // happen while this task holds a clone.
                    let _permit = semaphore.acquire().await;
                    let mut context = PolicyContext::default();
                    context.extra.insert("workflow_id".into(), workflow_id.into());
                    Self::run_step(&step, &router, &handoff, &parameters, "gateway", &context, &op)
                        .await
                });
            }

            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(result) => {
                        if !result.success {
                            failed = true;
                        }
                        completed.insert(result.step_id.clone(), result);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Workflow step task panicked");
                        failed = true;
                    }
                }
            }

            pending.retain(|index| !completed.contains_key(&workflow.steps[*index].step_id));
        }

        // Report in declaration order.
        workflow
            .steps
            .iter()
            .filter_map(|step| completed.remove(&step.step_id))
            .collect()
    }

    async fn run_step(
        step: &WorkflowStep,
        router: &Arc<CapabilityRouter>,
        handoff: &Arc<HandoffVerifier>,
        parameters: &Payload,
        from_agent: &str,
        context: &PolicyContext,
        op: &OpContext,
    ) -> StepResult {
        let start = Instant::now();

        // Runtime parameters overlay the step template.
        let mut payload = step.payload_template.clone();
        for (key, value) in parameters {
            payload.insert(key.clone(), value.clone());
        }

        // Resolve the agent: type hint first, capability routing second.
        let agent = step
            .agent_type_hint
            .as_deref()
            .and_then(|hint| router.find_by_type(hint))
            .or_else(|| router.route(&step.action).agent);

        let Some(agent) = agent else {
            return StepResult::failure(
                step,
                format!("No agent found for action: {}", step.action),
            );
        };

        // Re-verify the hop before execution.
        let verification =
            match handoff.verify(from_agent, agent.agent_id(), &step.action, &payload, context) {
                Ok(verification) => verification,
                Err(e) => return StepResult::failure(step, e.to_string()),
            };

        if !verification.allowed {
            let mut result = StepResult::failure(
                step,
                verification
                    .blocked_reason
                    .unwrap_or_else(|| "Handoff blocked".to_string()),
            );
            result.agent_id = Some(agent.agent_id().to_string());
            result.handoff_id = Some(verification.handoff_id);
            return result;
        }

        let effective_payload = verification.modified_payload.unwrap_or(payload);
        let action_result = agent.execute(&step.action, &effective_payload, context, op).await;

        StepResult {
            step_id: step.step_id.clone(),
            action: step.action.clone(),
            agent_id: Some(agent.agent_id().to_string()),
            success: action_result.success,
            result_data: action_result.result_data,
            error: action_result.error,
            handoff_id: Some(verification.handoff_id),
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        }
    }
}
