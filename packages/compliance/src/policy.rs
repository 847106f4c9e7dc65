//! Policy primitives.
//!
//! A policy evaluates one action + payload + context and produces a
//! [`PolicyResult`] carrying a verdict, a severity-scaled risk delta, and
//! optionally a rewritten payload. Three reusable shapes cover most
//! policies: free-form [`Policy`] implementations, ordered-predicate
//! [`RulePolicy`], and numeric [`ThresholdPolicy`].

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Untyped action payload. Keys are preserved verbatim; schema descriptors
/// flag the unknown ones.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Evaluation context supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    /// Acting agent, when known
    pub agent_id: Option<String>,
    /// Department of the acting identity
    pub department: Option<String>,
    /// Free-form extras (recipient, handoff ids, ...)
    pub extra: Payload,
}

impl PolicyContext {
    pub fn for_agent(agent_id: impl Into<String>, department: impl Into<String>) -> Self {
        Self {
            agent_id: Some(agent_id.into()),
            department: Some(department.into()),
            extra: Payload::new(),
        }
    }

    /// Lookup in the free-form extras.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}

/// Categories of compliance policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCategory {
    // Financial
    ExpenseLimits,
    BudgetControls,
    InvoiceApproval,
    FraudPrevention,

    // Legal
    ContractReview,
    NdaEnforcement,
    IpProtection,
    LitigationHold,

    // Security / IT
    AccessControl,
    DataClassification,
    ChangeManagement,

    // HR / Employment
    HiringCompliance,
    Compensation,
    Termination,
    LeaveManagement,

    // Procurement
    VendorApproval,
    SpendingLimits,

    // Data privacy & communications
    PiiProtection,
    Communications,

    // Structural
    PayloadSchema,
}

/// Verdict a policy can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVerdict {
    Allow,
    Modify,
    Warn,
    Escalate,
    Deny,
}

impl std::fmt::Display for PolicyVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Modify => write!(f, "modify"),
            Self::Warn => write!(f, "warn"),
            Self::Escalate => write!(f, "escalate"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// Severity of a policy violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySeverity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl PolicySeverity {
    pub fn weight(&self) -> f64 {
        *self as u8 as f64
    }
}

/// Result of one policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResult {
    pub policy_id: String,
    pub policy_name: String,
    pub category: PolicyCategory,
    pub verdict: PolicyVerdict,
    pub severity: PolicySeverity,

    /// Does this result permit the action?
    pub allowed: bool,
    pub reason: String,
    pub suggestion: Option<String>,
    /// Payload rewrite attached to a Modify verdict
    pub modified_payload: Option<Payload>,

    /// Risk contribution fed back into TIRS
    pub risk_delta: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-policy evaluation counters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolicyStats {
    pub evaluation_count: u64,
    pub violation_count: u64,
}

/// Shared identity + counters embedded in every policy.
#[derive(Debug)]
pub struct PolicyMeta {
    policy_id: String,
    name: String,
    category: PolicyCategory,
    severity: PolicySeverity,
    evaluations: AtomicU64,
    violations: AtomicU64,
}

impl PolicyMeta {
    pub fn new(
        policy_id: impl Into<String>,
        name: impl Into<String>,
        category: PolicyCategory,
        severity: PolicySeverity,
    ) -> Self {
        Self {
            policy_id: policy_id.into(),
            name: name.into(),
            category,
            severity,
            evaluations: AtomicU64::new(0),
            violations: AtomicU64::new(0),
        }
    }

    pub fn policy_id(&self) -> &str {
        &self.policy_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> PolicyCategory {
        self.category
    }

    pub fn severity(&self) -> PolicySeverity {
        self.severity
    }

    pub fn stats(&self) -> PolicyStats {
        PolicyStats {
            evaluation_count: self.evaluations.load(Ordering::Relaxed),
            violation_count: self.violations.load(Ordering::Relaxed),
        }
    }

    fn base(&self, verdict: PolicyVerdict, allowed: bool, reason: String) -> PolicyResult {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        PolicyResult {
            policy_id: self.policy_id.clone(),
            policy_name: self.name.clone(),
            category: self.category,
            verdict,
            severity: self.severity,
            allowed,
            reason,
            suggestion: None,
            modified_payload: None,
            risk_delta: 0.0,
            timestamp: Utc::now(),
        }
    }

    /// ALLOW result.
    pub fn allow(&self, reason: impl Into<String>) -> PolicyResult {
        self.base(PolicyVerdict::Allow, true, reason.into())
    }

    /// DENY result; counts as a violation and contributes
    /// `0.1 x severity` risk.
    pub fn deny(&self, reason: impl Into<String>, suggestion: Option<String>) -> PolicyResult {
        self.violations.fetch_add(1, Ordering::Relaxed);
        let mut result = self.base(PolicyVerdict::Deny, false, reason.into());
        result.suggestion = suggestion;
        result.risk_delta = 0.1 * self.severity.weight();
        result
    }

    /// MODIFY result carrying a payload rewrite.
    pub fn modify(
        &self,
        reason: impl Into<String>,
        modified_payload: Payload,
        suggestion: Option<String>,
    ) -> PolicyResult {
        let mut result = self.base(PolicyVerdict::Modify, true, reason.into());
        result.modified_payload = Some(modified_payload);
        result.suggestion = suggestion;
        result.risk_delta = 0.05;
        result
    }

    /// ESCALATE result: the action needs an authorized approver.
    pub fn escalate(&self, reason: impl Into<String>, suggestion: Option<String>) -> PolicyResult {
        let mut result = self.base(PolicyVerdict::Escalate, true, reason.into());
        result.suggestion =
            suggestion.or_else(|| Some("Requires approval from authorized approver".to_string()));
        result.risk_delta = 0.05;
        result
    }

    /// WARN result.
    pub fn warn(&self, reason: impl Into<String>) -> PolicyResult {
        let mut result = self.base(PolicyVerdict::Warn, true, reason.into());
        result.risk_delta = 0.02;
        result
    }
}

/// A compliance policy.
pub trait Policy: Send + Sync {
    /// Identity and counters.
    fn meta(&self) -> &PolicyMeta;

    /// Evaluate the policy against one action.
    fn evaluate(&self, action: &str, payload: &Payload, context: &PolicyContext) -> PolicyResult;

    fn policy_id(&self) -> &str {
        self.meta().policy_id()
    }

    fn name(&self) -> &str {
        self.meta().name()
    }

    fn category(&self) -> PolicyCategory {
        self.meta().category()
    }

    fn severity(&self) -> PolicySeverity {
        self.meta().severity()
    }

    fn stats(&self) -> PolicyStats {
        self.meta().stats()
    }
}

// ============================================================================
// PAYLOAD HELPERS
// ============================================================================

/// Numeric field lookup; accepts JSON numbers and numeric strings.
pub fn number_field(payload: &Payload, key: &str) -> Option<f64> {
    match payload.get(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// First present numeric field among aliases.
pub fn number_field_any(payload: &Payload, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| number_field(payload, key))
}

/// String field lookup.
pub fn str_field<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(|v| v.as_str())
}

/// First present string field among aliases.
pub fn str_field_any<'a>(payload: &'a Payload, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| str_field(payload, key))
}

/// Truthy boolean field; accepts bools and `"true"`.
pub fn bool_field(payload: &Payload, key: &str) -> bool {
    match payload.get(key) {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s == "true",
        _ => false,
    }
}

/// Truthy among aliases.
pub fn bool_field_any(payload: &Payload, keys: &[&str]) -> bool {
    keys.iter().any(|key| bool_field(payload, key))
}

// ============================================================================
// RULE POLICY
// ============================================================================

/// Predicate used by [`RulePolicy`]: return `Some(result)` to decide,
/// `None` to pass to the next rule.
pub type PolicyRuleFn =
    Box<dyn Fn(&PolicyMeta, &str, &Payload, &PolicyContext) -> Option<PolicyResult> + Send + Sync>;

/// Policy built from an ordered list of predicates. The first rule that
/// returns a result decides; fallthrough is Allow.
pub struct RulePolicy {
    meta: PolicyMeta,
    rules: Vec<PolicyRuleFn>,
}

impl RulePolicy {
    pub fn new(
        policy_id: impl Into<String>,
        name: impl Into<String>,
        category: PolicyCategory,
        severity: PolicySeverity,
    ) -> Self {
        Self {
            meta: PolicyMeta::new(policy_id, name, category, severity),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(
        mut self,
        rule: impl Fn(&PolicyMeta, &str, &Payload, &PolicyContext) -> Option<PolicyResult>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.rules.push(Box::new(rule));
        self
    }
}

impl Policy for RulePolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, context: &PolicyContext) -> PolicyResult {
        for rule in &self.rules {
            if let Some(result) = rule(&self.meta, action, payload, context) {
                return result;
            }
        }
        self.meta.allow("All rules passed")
    }
}

// ============================================================================
// THRESHOLD POLICY
// ============================================================================

/// Policy over a single numeric payload field.
///
/// The first exceeded threshold in deny > escalate > warn order decides.
/// A missing or non-numeric field allows.
pub struct ThresholdPolicy {
    meta: PolicyMeta,
    field: String,
    warn_threshold: Option<f64>,
    escalate_threshold: Option<f64>,
    deny_threshold: Option<f64>,
}

impl ThresholdPolicy {
    pub fn new(
        policy_id: impl Into<String>,
        name: impl Into<String>,
        category: PolicyCategory,
        severity: PolicySeverity,
        field: impl Into<String>,
    ) -> Self {
        Self {
            meta: PolicyMeta::new(policy_id, name, category, severity),
            field: field.into(),
            warn_threshold: None,
            escalate_threshold: None,
            deny_threshold: None,
        }
    }

    pub fn warn_at(mut self, threshold: f64) -> Self {
        self.warn_threshold = Some(threshold);
        self
    }

    pub fn escalate_at(mut self, threshold: f64) -> Self {
        self.escalate_threshold = Some(threshold);
        self
    }

    pub fn deny_at(mut self, threshold: f64) -> Self {
        self.deny_threshold = Some(threshold);
        self
    }
}

impl Policy for ThresholdPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, _action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let Some(value) = number_field(payload, &self.field) else {
            return self
                .meta
                .allow(format!("Field {} not present or not numeric", self.field));
        };

        if let Some(deny) = self.deny_threshold {
            if value >= deny {
                return self.meta.deny(
                    format!("{} ({value}) exceeds maximum ({deny})", self.field),
                    Some(format!("Reduce {} below {deny}", self.field)),
                );
            }
        }

        if let Some(escalate) = self.escalate_threshold {
            if value >= escalate {
                return self.meta.escalate(
                    format!(
                        "{} ({value}) requires approval (threshold: {escalate})",
                        self.field
                    ),
                    None,
                );
            }
        }

        if let Some(warn) = self.warn_threshold {
            if value >= warn {
                return self
                    .meta
                    .warn(format!("{} ({value}) approaching limit", self.field));
            }
        }

        self.meta.allow(format!("{} ({value}) within limits", self.field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> Payload {
        json.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_risk_delta_scales_with_severity() {
        let low = PolicyMeta::new("P1", "Low", PolicyCategory::ExpenseLimits, PolicySeverity::Low);
        let critical = PolicyMeta::new(
            "P2",
            "Critical",
            PolicyCategory::ExpenseLimits,
            PolicySeverity::Critical,
        );

        assert!((low.deny("no", None).risk_delta - 0.1).abs() < 1e-9);
        assert!((critical.deny("no", None).risk_delta - 0.4).abs() < 1e-9);
        assert!((low.escalate("check", None).risk_delta - 0.05).abs() < 1e-9);
        assert!((low.warn("careful").risk_delta - 0.02).abs() < 1e-9);
        assert_eq!(low.allow("fine").risk_delta, 0.0);
    }

    #[test]
    fn test_counters_track_evaluations_and_violations() {
        let meta = PolicyMeta::new("P1", "P", PolicyCategory::ExpenseLimits, PolicySeverity::Medium);
        meta.allow("ok");
        meta.deny("no", None);
        meta.warn("hm");

        let stats = meta.stats();
        assert_eq!(stats.evaluation_count, 3);
        assert_eq!(stats.violation_count, 1);
    }

    #[test]
    fn test_rule_policy_first_match_wins() {
        let policy = RulePolicy::new(
            "R1",
            "Rules",
            PolicyCategory::AccessControl,
            PolicySeverity::High,
        )
        .with_rule(|meta, action, _, _| {
            (action == "blocked").then(|| meta.deny("blocked action", None))
        })
        .with_rule(|meta, _, _, _| Some(meta.warn("everything is suspicious")));

        let ctx = PolicyContext::default();
        let denied = policy.evaluate("blocked", &payload(serde_json::json!({})), &ctx);
        assert_eq!(denied.verdict, PolicyVerdict::Deny);

        let warned = policy.evaluate("other", &payload(serde_json::json!({})), &ctx);
        assert_eq!(warned.verdict, PolicyVerdict::Warn);
    }

    #[test]
    fn test_rule_policy_fallthrough_allows() {
        let policy = RulePolicy::new(
            "R2",
            "Rules",
            PolicyCategory::AccessControl,
            PolicySeverity::Low,
        );
        let result = policy.evaluate("anything", &payload(serde_json::json!({})), &PolicyContext::default());
        assert_eq!(result.verdict, PolicyVerdict::Allow);
        assert!(result.allowed);
    }

    #[test]
    fn test_threshold_order_deny_over_escalate_over_warn() {
        let policy = ThresholdPolicy::new(
            "T1",
            "Amounts",
            PolicyCategory::SpendingLimits,
            PolicySeverity::Medium,
            "amount",
        )
        .warn_at(100.0)
        .escalate_at(500.0)
        .deny_at(1000.0);

        let ctx = PolicyContext::default();
        let eval = |amount: f64| {
            policy
                .evaluate("spend", &payload(serde_json::json!({"amount": amount})), &ctx)
                .verdict
        };

        assert_eq!(eval(50.0), PolicyVerdict::Allow);
        assert_eq!(eval(100.0), PolicyVerdict::Warn);
        assert_eq!(eval(500.0), PolicyVerdict::Escalate);
        assert_eq!(eval(2000.0), PolicyVerdict::Deny);
    }

    #[test]
    fn test_threshold_missing_field_allows() {
        let policy = ThresholdPolicy::new(
            "T2",
            "Amounts",
            PolicyCategory::SpendingLimits,
            PolicySeverity::Medium,
            "amount",
        )
        .deny_at(10.0);

        let ctx = PolicyContext::default();
        let missing = policy.evaluate("spend", &payload(serde_json::json!({})), &ctx);
        assert_eq!(missing.verdict, PolicyVerdict::Allow);

        let non_numeric =
            policy.evaluate("spend", &payload(serde_json::json!({"amount": [1, 2]})), &ctx);
        assert_eq!(non_numeric.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_threshold_accepts_numeric_strings() {
        let policy = ThresholdPolicy::new(
            "T3",
            "Amounts",
            PolicyCategory::SpendingLimits,
            PolicySeverity::Medium,
            "amount",
        )
        .deny_at(10.0);

        let result = policy.evaluate(
            "spend",
            &payload(serde_json::json!({"amount": "25"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
    }

    #[test]
    fn test_repeat_evaluation_is_stable() {
        let policy = ThresholdPolicy::new(
            "T4",
            "Amounts",
            PolicyCategory::SpendingLimits,
            PolicySeverity::Medium,
            "amount",
        )
        .escalate_at(100.0);

        let payload = payload(serde_json::json!({"amount": 150}));
        let ctx = PolicyContext::default();
        let first = policy.evaluate("spend", &payload, &ctx);
        let second = policy.evaluate("spend", &payload, &ctx);
        assert_eq!(first.verdict, second.verdict);
        assert_eq!(first.reason, second.reason);
    }
}
