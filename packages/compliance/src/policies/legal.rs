//! Legal compliance policies: contract review, NDAs, IP, litigation holds.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::policy::{
    bool_field, number_field_any, str_field, str_field_any, Payload, Policy, PolicyCategory,
    PolicyContext, PolicyMeta, PolicyResult, PolicySeverity,
};

/// Contract review requirements by value and type.
pub struct ContractReviewPolicy {
    meta: PolicyMeta,
    /// (upper value bound, required review level), ascending
    review_ladder: Vec<(f64, &'static str)>,
    high_risk_types: Vec<&'static str>,
}

impl ContractReviewPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "LEG-001",
                "Contract Review Policy",
                PolicyCategory::ContractReview,
                PolicySeverity::High,
            ),
            review_ladder: vec![
                (10_000.0, "legal_review"),
                (50_000.0, "senior_legal"),
                (100_000.0, "general_counsel"),
                (500_000.0, "ceo_approval"),
            ],
            high_risk_types: vec!["licensing", "ip_transfer", "exclusivity", "indemnification"],
        }
    }

    fn required_review(&self, value: f64, contract_type: &str) -> &'static str {
        if self.high_risk_types.contains(&contract_type) {
            return "general_counsel";
        }
        for (bound, level) in &self.review_ladder {
            if value <= *bound {
                return level;
            }
        }
        "ceo_approval"
    }
}

impl Default for ContractReviewPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for ContractReviewPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        if !action.to_lowercase().contains("contract") {
            return self.meta.allow("Not a contract action");
        }

        let value = number_field_any(payload, &["value", "amount"]).unwrap_or(0.0);
        let contract_type = str_field(payload, "type").unwrap_or("standard");
        let legal_reviewed = bool_field(payload, "legal_reviewed");
        let terms_modified = bool_field(payload, "terms_modified");

        let required = self.required_review(value, contract_type);

        if terms_modified && !legal_reviewed {
            return self.meta.escalate(
                "Contract with modified terms requires legal review",
                Some(format!("Submit to {required} for review")),
            );
        }

        if value > 10_000.0 && !legal_reviewed {
            return self.meta.escalate(
                format!("Contract value ${value:.2} requires {required}"),
                Some(format!("Submit to {required} before execution")),
            );
        }

        self.meta.allow("Contract review requirements met")
    }
}

/// NDA registry gating disclosure of confidential information.
pub struct NdaEnforcementPolicy {
    meta: PolicyMeta,
    nda_registry: RwLock<HashSet<String>>,
}

impl NdaEnforcementPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "LEG-002",
                "NDA Enforcement Policy",
                PolicyCategory::NdaEnforcement,
                PolicySeverity::Critical,
            ),
            nda_registry: RwLock::new(HashSet::new()),
        }
    }

    /// Register an entity as having an active NDA.
    pub fn register_nda(&self, entity_id: impl Into<String>) {
        self.nda_registry.write().insert(entity_id.into());
    }

    pub fn has_nda(&self, entity_id: &str) -> bool {
        self.nda_registry.read().contains(entity_id)
    }
}

impl Default for NdaEnforcementPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for NdaEnforcementPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !["share", "disclose", "send"]
            .iter()
            .any(|a| action_lower.contains(a))
        {
            return self.meta.allow("Not a disclosure action");
        }

        let is_confidential = bool_field(payload, "confidential");
        let classification = str_field(payload, "classification").unwrap_or("internal");

        if !is_confidential && !["confidential", "secret", "restricted"].contains(&classification) {
            return self.meta.allow("Not confidential information");
        }

        let Some(recipient) = str_field_any(payload, &["recipient", "to"]) else {
            return self
                .meta
                .warn("No recipient specified for confidential disclosure");
        };

        if !self.has_nda(recipient) {
            return self.meta.deny(
                format!("Cannot disclose confidential information to {recipient} (no NDA on file)"),
                Some(format!("Execute NDA with {recipient} before disclosure")),
            );
        }

        self.meta.allow(format!("NDA verified for {recipient}"))
    }
}

/// Protects source code, algorithms, patents, and trade secrets.
pub struct IpProtectionPolicy {
    meta: PolicyMeta,
    protected_types: Vec<&'static str>,
}

impl IpProtectionPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "LEG-003",
                "IP Protection Policy",
                PolicyCategory::IpProtection,
                PolicySeverity::Critical,
            ),
            protected_types: vec!["source_code", "algorithm", "patent", "trade_secret", "design"],
        }
    }
}

impl Default for IpProtectionPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for IpProtectionPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, _action: &str, payload: &Payload, context: &PolicyContext) -> PolicyResult {
        let content_type = str_field(payload, "content_type").unwrap_or("");
        let content_lower = content_type.to_lowercase();

        let is_protected = self
            .protected_types
            .iter()
            .any(|pt| content_lower.contains(pt));
        if !is_protected {
            return self.meta.allow("Not protected IP content");
        }

        let is_external = bool_field(payload, "external")
            || context
                .get_str("recipient")
                .is_some_and(|r| r.contains("external"));

        if is_external {
            return self.meta.deny(
                format!("Cannot transfer protected IP ({content_type}) externally"),
                Some("Request IP transfer approval from legal and executive team".to_string()),
            );
        }

        if !payload.contains_key("ip_authorization") {
            return self.meta.escalate(
                "Protected IP access requires authorization",
                Some("Submit IP access request to legal department".to_string()),
            );
        }

        self.meta.allow("IP access authorized")
    }
}

#[derive(Debug, Clone)]
struct Hold {
    scope: Payload,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

/// Blocks destructive actions on data under litigation hold.
pub struct LitigationHoldPolicy {
    meta: PolicyMeta,
    holds: RwLock<HashMap<String, Hold>>,
}

impl LitigationHoldPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "LEG-004",
                "Litigation Hold Policy",
                PolicyCategory::LitigationHold,
                PolicySeverity::Critical,
            ),
            holds: RwLock::new(HashMap::new()),
        }
    }

    /// Add a litigation hold over a payload scope.
    pub fn add_hold(&self, hold_id: impl Into<String>, scope: Payload) {
        self.holds.write().insert(
            hold_id.into(),
            Hold {
                scope,
                created_at: Utc::now(),
            },
        );
    }

    /// Release a hold.
    pub fn release_hold(&self, hold_id: &str) {
        self.holds.write().remove(hold_id);
    }

    fn matches_scope(payload: &Payload, scope: &Payload) -> bool {
        for (key, value) in scope {
            if let Some(observed) = payload.get(key) {
                match value {
                    serde_json::Value::Array(options) => {
                        if options.contains(observed) {
                            return true;
                        }
                    }
                    _ => {
                        if observed == value {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

impl Default for LitigationHoldPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for LitigationHoldPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !["delete", "destroy", "purge", "archive", "modify"]
            .iter()
            .any(|a| action_lower.contains(a))
        {
            return self.meta.allow("Not a destructive action");
        }

        let holds = self.holds.read();
        for (hold_id, hold) in holds.iter() {
            if Self::matches_scope(payload, &hold.scope) {
                return self.meta.deny(
                    format!("Action blocked by litigation hold {hold_id}"),
                    Some("Contact legal department for guidance on held data".to_string()),
                );
            }
        }

        self.meta.allow("No litigation holds apply")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyVerdict;

    fn payload(json: serde_json::Value) -> Payload {
        json.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_large_contract_without_review_escalates() {
        let policy = ContractReviewPolicy::new();
        let result = policy.evaluate(
            "review_contract",
            &payload(serde_json::json!({"value": 75_000})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
        assert!(result.reason.contains("general_counsel"));
    }

    #[test]
    fn test_reviewed_contract_allowed() {
        let policy = ContractReviewPolicy::new();
        let result = policy.evaluate(
            "review_contract",
            &payload(serde_json::json!({"value": 75_000, "legal_reviewed": true})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_high_risk_type_needs_general_counsel() {
        let policy = ContractReviewPolicy::new();
        let result = policy.evaluate(
            "approve_contract",
            &payload(serde_json::json!({"value": 15_000, "type": "ip_transfer"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
        assert!(result.suggestion.as_deref().unwrap().contains("general_counsel"));
    }

    #[test]
    fn test_nda_denies_without_registration() {
        let policy = NdaEnforcementPolicy::new();
        let result = policy.evaluate(
            "share_document",
            &payload(serde_json::json!({"confidential": true, "recipient": "acme-corp"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.contains("no NDA"));
    }

    #[test]
    fn test_nda_allows_registered_entity() {
        let policy = NdaEnforcementPolicy::new();
        policy.register_nda("acme-corp");
        let result = policy.evaluate(
            "share_document",
            &payload(serde_json::json!({"confidential": true, "recipient": "acme-corp"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_nonconfidential_disclosure_allowed() {
        let policy = NdaEnforcementPolicy::new();
        let result = policy.evaluate(
            "send_email",
            &payload(serde_json::json!({"recipient": "anyone"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_external_ip_transfer_denied() {
        let policy = IpProtectionPolicy::new();
        let result = policy.evaluate(
            "send_document",
            &payload(serde_json::json!({"content_type": "source_code", "external": true})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
    }

    #[test]
    fn test_internal_ip_access_needs_authorization() {
        let policy = IpProtectionPolicy::new();
        let result = policy.evaluate(
            "access_document",
            &payload(serde_json::json!({"content_type": "trade_secret"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
    }

    #[test]
    fn test_litigation_hold_blocks_matching_delete() {
        let policy = LitigationHoldPolicy::new();
        policy.add_hold(
            "HOLD-2024-001",
            payload(serde_json::json!({"dataset": "emails_2023"})),
        );

        let result = policy.evaluate(
            "delete_records",
            &payload(serde_json::json!({"dataset": "emails_2023"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.contains("HOLD-2024-001"));
    }

    #[test]
    fn test_litigation_hold_ignores_unrelated_delete() {
        let policy = LitigationHoldPolicy::new();
        policy.add_hold(
            "HOLD-2024-001",
            payload(serde_json::json!({"dataset": "emails_2023"})),
        );

        let result = policy.evaluate(
            "delete_records",
            &payload(serde_json::json!({"dataset": "scratch_space"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_released_hold_no_longer_applies() {
        let policy = LitigationHoldPolicy::new();
        policy.add_hold("H1", payload(serde_json::json!({"dataset": "x"})));
        policy.release_hold("H1");

        let result = policy.evaluate(
            "purge_data",
            &payload(serde_json::json!({"dataset": "x"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }
}
