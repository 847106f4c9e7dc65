//! The compliance engine.
//!
//! Selects the policies applicable to an action, validates the payload
//! against its schema, runs the policies in registration order, and merges
//! the individual verdicts into one aggregate: Deny wins, then Escalate,
//! Modify, Warn, Allow. Modify rewrites are overlaid onto the payload in
//! evaluation order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::policies::default_policies;
use crate::policy::{
    Payload, Policy, PolicyCategory, PolicyContext, PolicyResult, PolicySeverity, PolicyStats,
    PolicyVerdict,
};
use crate::schema::SchemaRegistry;

/// Merged outcome of evaluating one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceAggregate {
    pub action: String,
    /// True iff no policy rendered Deny
    pub allowed: bool,
    /// Aggregate verdict: Deny > Escalate > Modify > Warn > Allow
    pub verdict: PolicyVerdict,
    /// Individual results in evaluation order
    pub results: Vec<PolicyResult>,
    /// Ids of the policies evaluated
    pub policies_evaluated: Vec<String>,
    /// Highest-severity Deny (first on ties)
    pub primary_blocker: Option<PolicyResult>,
    /// Suggestions from every non-Allow result
    pub suggestions: Vec<String>,
    /// Payload with Modify rewrites applied in order
    pub merged_payload: Payload,
    /// Payload fields not declared in the action schema
    pub unknown_fields: Vec<String>,
    /// Sum of per-policy risk deltas
    pub total_risk_delta: f64,
}

impl ComplianceAggregate {
    /// Ids of policies that rendered something other than Allow.
    pub fn policies_triggered(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| r.verdict != PolicyVerdict::Allow)
            .map(|r| r.policy_id.clone())
            .collect()
    }

    /// First result with the given verdict, in evaluation order.
    pub fn first_with(&self, verdict: PolicyVerdict) -> Option<&PolicyResult> {
        self.results.iter().find(|r| r.verdict == verdict)
    }
}

/// Per-policy counter report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub policy_count: usize,
    pub policies: Vec<(String, PolicyStats)>,
}

/// Policy evaluation pipeline. The policy set is fixed after construction;
/// registry-backed policies mutate only their internal registries.
pub struct ComplianceEngine {
    schemas: SchemaRegistry,
    policies: Vec<Arc<dyn Policy>>,
}

impl ComplianceEngine {
    /// Engine with no policies (schema checks only).
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self {
            schemas,
            policies: Vec::new(),
        }
    }

    /// Engine loaded with the built-in policy set and default schemas.
    pub fn with_default_policies() -> Self {
        Self {
            schemas: SchemaRegistry::with_default_schemas(),
            policies: default_policies(),
        }
    }

    /// Add a policy during construction.
    pub fn with_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Look up a registered policy by id (for registry management).
    pub fn policy(&self, policy_id: &str) -> Option<&Arc<dyn Policy>> {
        self.policies.iter().find(|p| p.policy_id() == policy_id)
    }

    /// Evaluate an action against the applicable policies.
    ///
    /// `categories` limits evaluation to policies in those categories;
    /// `None` evaluates all.
    pub fn evaluate(
        &self,
        action: &str,
        payload: &Payload,
        context: &PolicyContext,
        categories: Option<&[PolicyCategory]>,
    ) -> ComplianceAggregate {
        // Schema gate runs before any policy.
        let schema_report = self.schemas.validate(action, payload);
        let mut results: Vec<PolicyResult> = Vec::new();

        if !schema_report.ok {
            results.push(PolicyResult {
                policy_id: "SCH-001".to_string(),
                policy_name: "Payload Schema".to_string(),
                category: PolicyCategory::PayloadSchema,
                verdict: PolicyVerdict::Deny,
                severity: PolicySeverity::High,
                allowed: false,
                reason: format!("Payload schema violation: {}", schema_report.violations.join("; ")),
                suggestion: Some("Correct the payload to match the action schema".to_string()),
                modified_payload: None,
                risk_delta: 0.1 * PolicySeverity::High.weight(),
                timestamp: chrono::Utc::now(),
            });
        }

        for policy in &self.policies {
            if let Some(wanted) = categories {
                if !wanted.contains(&policy.category()) {
                    continue;
                }
            }
            results.push(policy.evaluate(action, payload, context));
        }

        let aggregate = Self::merge(action, payload, results, schema_report.unknown_fields);

        tracing::info!(
            action = %action,
            allowed = aggregate.allowed,
            verdict = %aggregate.verdict,
            policies = aggregate.policies_evaluated.len(),
            risk_delta = aggregate.total_risk_delta,
            "Compliance evaluation complete"
        );

        aggregate
    }

    fn merge(
        action: &str,
        payload: &Payload,
        results: Vec<PolicyResult>,
        unknown_fields: Vec<String>,
    ) -> ComplianceAggregate {
        let allowed = results.iter().all(|r| r.verdict != PolicyVerdict::Deny);

        let verdict = if !allowed {
            PolicyVerdict::Deny
        } else if results.iter().any(|r| r.verdict == PolicyVerdict::Escalate) {
            PolicyVerdict::Escalate
        } else if results.iter().any(|r| r.verdict == PolicyVerdict::Modify) {
            PolicyVerdict::Modify
        } else if results.iter().any(|r| r.verdict == PolicyVerdict::Warn) {
            PolicyVerdict::Warn
        } else {
            PolicyVerdict::Allow
        };

        // Highest-severity Deny wins; evaluation order breaks ties.
        let mut primary_blocker: Option<PolicyResult> = None;
        for result in results.iter().filter(|r| r.verdict == PolicyVerdict::Deny) {
            let replace = primary_blocker
                .as_ref()
                .map_or(true, |current| result.severity > current.severity);
            if replace {
                primary_blocker = Some(result.clone());
            }
        }

        let suggestions: Vec<String> = results
            .iter()
            .filter(|r| r.verdict != PolicyVerdict::Allow)
            .filter_map(|r| r.suggestion.clone())
            .collect();

        let mut merged_payload = payload.clone();
        for result in &results {
            if result.verdict == PolicyVerdict::Modify {
                if let Some(rewrite) = &result.modified_payload {
                    for (key, value) in rewrite {
                        merged_payload.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        let total_risk_delta = results.iter().map(|r| r.risk_delta).sum();
        let policies_evaluated = results.iter().map(|r| r.policy_id.clone()).collect();

        ComplianceAggregate {
            action: action.to_string(),
            allowed,
            verdict,
            policies_evaluated,
            primary_blocker,
            suggestions,
            merged_payload,
            unknown_fields,
            total_risk_delta,
            results,
        }
    }

    /// Counter report for every registered policy.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            policy_count: self.policies.len(),
            policies: self
                .policies
                .iter()
                .map(|p| (p.policy_id().to_string(), p.stats()))
                .collect(),
        }
    }
}

impl Default for ComplianceEngine {
    fn default() -> Self {
        Self::with_default_policies()
    }
}
