//! IT and security policies: access control, data classification, change
//! management.

use crate::policy::{
    bool_field, str_field, str_field_any, Payload, Policy, PolicyCategory, PolicyContext,
    PolicyMeta, PolicyResult, PolicySeverity,
};

/// Least-privilege access enforcement.
pub struct AccessControlPolicy {
    meta: PolicyMeta,
    contractor_restricted: Vec<&'static str>,
    admin_review_required: Vec<&'static str>,
}

impl AccessControlPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "IT-001",
                "Access Control Policy",
                PolicyCategory::AccessControl,
                PolicySeverity::Critical,
            ),
            contractor_restricted: vec!["admin", "root", "superuser"],
            admin_review_required: vec!["production", "financial_data", "pii"],
        }
    }
}

impl Default for AccessControlPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for AccessControlPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !["provision_access", "grant_access", "modify_permissions"]
            .iter()
            .any(|a| action_lower.contains(a))
        {
            return self.meta.allow("Not an access action");
        }

        let user = str_field(payload, "user").unwrap_or("").to_lowercase();
        let role = str_field(payload, "role").unwrap_or("").to_lowercase();

        if user.contains("@external") || user.contains("contractor") {
            for restricted in &self.contractor_restricted {
                if role.contains(restricted) {
                    return self.meta.deny(
                        format!("Contractors cannot have '{restricted}' access"),
                        Some("Request a scoped role instead".to_string()),
                    );
                }
            }
        }

        let systems: Vec<String> = payload
            .get("systems")
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|s| s.as_str())
                    .map(|s| s.to_lowercase())
                    .collect()
            })
            .unwrap_or_default();

        for system in &systems {
            if self
                .admin_review_required
                .iter()
                .any(|sensitive| system.contains(sensitive))
            {
                return self.meta.escalate(
                    format!("Access to '{system}' requires security review"),
                    Some("Submit an access request for security review".to_string()),
                );
            }
        }

        self.meta.allow("Access request within policy")
    }
}

/// Restricts export/share/copy of classified data.
pub struct DataClassificationPolicy {
    meta: PolicyMeta,
    restricted_actions: Vec<&'static str>,
    restricted_classifications: Vec<&'static str>,
}

impl DataClassificationPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "IT-002",
                "Data Classification Policy",
                PolicyCategory::DataClassification,
                PolicySeverity::Critical,
            ),
            restricted_actions: vec!["export", "share", "copy"],
            restricted_classifications: vec!["confidential", "secret", "top_secret"],
        }
    }
}

impl Default for DataClassificationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for DataClassificationPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !self
            .restricted_actions
            .iter()
            .any(|a| action_lower.contains(a))
        {
            return self.meta.allow("Not a restricted data action");
        }

        let classification = str_field(payload, "classification")
            .unwrap_or("internal")
            .to_lowercase();

        if self
            .restricted_classifications
            .contains(&classification.as_str())
        {
            return self.meta.deny(
                format!("Cannot {action_lower} data classified as {classification}"),
                Some("Request a data handling exception from security".to_string()),
            );
        }

        self.meta.allow("Data classification permits this action")
    }
}

/// Production changes require a change ticket (ITIL).
pub struct ChangeManagementPolicy {
    meta: PolicyMeta,
}

impl ChangeManagementPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "IT-003",
                "Change Management Policy",
                PolicyCategory::ChangeManagement,
                PolicySeverity::Medium,
            ),
        }
    }
}

impl Default for ChangeManagementPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for ChangeManagementPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !action_lower.contains("deploy") && !action_lower.contains("change") {
            return self.meta.allow("Not a change action");
        }

        let environment = str_field_any(payload, &["environment", "env"]).unwrap_or("");
        if environment != "production" {
            return self.meta.allow("Non-production change");
        }

        if bool_field(payload, "emergency") {
            return self
                .meta
                .warn("Emergency production change; retroactive ticket required");
        }

        if str_field_any(payload, &["change_ticket", "ticket"]).is_none() {
            return self.meta.escalate(
                "Production changes require an approved change ticket",
                Some("File a change ticket and obtain CAB approval".to_string()),
            );
        }

        self.meta.allow("Change ticket on file")
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
    fn test_contractor_admin_access_denied() {
        let policy = AccessControlPolicy::new();
        let result = policy.evaluate(
            "provision_access",
            &payload(serde_json::json!({"user": "jane@external.com", "role": "admin"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.contains("admin"));
    }

    #[test]
    fn test_sensitive_system_escalates() {
        let policy = AccessControlPolicy::new();
        let result = policy.evaluate(
            "provision_access",
            &payload(serde_json::json!({
                "user": "sam@company.com",
                "role": "developer",
                "systems": ["production_db"]
            })),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
        assert!(result.reason.contains("security review"));
    }

    #[test]
    fn test_ordinary_access_allowed() {
        let policy = AccessControlPolicy::new();
        let result = policy.evaluate(
            "provision_access",
            &payload(serde_json::json!({
                "user": "sam@company.com",
                "role": "developer",
                "systems": ["wiki", "jira"]
            })),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_export_confidential_denied() {
        let policy = DataClassificationPolicy::new();
        let result = policy.evaluate(
            "export_report",
            &payload(serde_json::json!({"classification": "confidential"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
    }

    #[test]
    fn test_export_internal_allowed() {
        let policy = DataClassificationPolicy::new();
        let result = policy.evaluate(
            "export_report",
            &payload(serde_json::json!({"classification": "internal"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_production_deploy_without_ticket_escalates() {
        let policy = ChangeManagementPolicy::new();
        let result = policy.evaluate(
            "deploy_change",
            &payload(serde_json::json!({"environment": "production"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
    }

    #[test]
    fn test_production_deploy_with_ticket_allowed() {
        let policy = ChangeManagementPolicy::new();
        let result = policy.evaluate(
            "deploy_change",
            &payload(serde_json::json!({
                "environment": "production",
                "change_ticket": "CHG-1234"
            })),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_staging_deploy_unrestricted() {
        let policy = ChangeManagementPolicy::new();
        let result = policy.evaluate(
            "deploy_change",
            &payload(serde_json::json!({"environment": "staging"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }
}
