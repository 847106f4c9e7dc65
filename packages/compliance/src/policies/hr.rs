//! HR compliance policies: hiring, compensation bands, termination, leave.

use crate::policy::{
    bool_field, number_field_any, str_field, Payload, Policy, PolicyCategory, PolicyContext,
    PolicyMeta, PolicyResult, PolicySeverity,
};

/// I-9 verification and background checks before onboarding (IRCA/FCRA).
pub struct HiringCompliancePolicy {
    meta: PolicyMeta,
}

impl HiringCompliancePolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "HR-001",
                "Hiring Compliance Policy",
                PolicyCategory::HiringCompliance,
                PolicySeverity::Critical,
            ),
        }
    }
}

impl Default for HiringCompliancePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for HiringCompliancePolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !["hire", "onboard", "start_employment"]
            .iter()
            .any(|a| action_lower.contains(a))
        {
            return self.meta.allow("Not an onboarding action");
        }

        let i9_status = str_field(payload, "i9_status").unwrap_or("");
        if !["verified", "pending_reverification"].contains(&i9_status) {
            return self.meta.deny(
                "Cannot complete hire without I-9 verification (IRCA requirement)",
                Some("Complete I-9 verification before start date".to_string()),
            );
        }

        let role_type = str_field(payload, "role_type").unwrap_or("standard");
        if ["finance", "security", "executive"].contains(&role_type)
            && !bool_field(payload, "background_check_complete")
        {
            return self.meta.deny(
                format!("Background check required for {role_type} roles (FCRA)"),
                Some("Complete background check before hire".to_string()),
            );
        }

        if !bool_field(payload, "offer_signed") {
            return self.meta.escalate(
                "Offer letter must be signed before onboarding",
                Some("Obtain signed offer letter".to_string()),
            );
        }

        self.meta.allow("Hiring compliance requirements met")
    }
}

/// Salary band enforcement by level, plus large-raise review.
pub struct CompensationPolicy {
    meta: PolicyMeta,
    /// level -> (band minimum, band maximum)
    bands: Vec<(&'static str, f64, f64)>,
    max_raise_pct: f64,
}

impl CompensationPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "HR-002",
                "Compensation Policy",
                PolicyCategory::Compensation,
                PolicySeverity::High,
            ),
            bands: vec![
                ("L1", 50_000.0, 75_000.0),
                ("L2", 65_000.0, 95_000.0),
                ("L3", 85_000.0, 125_000.0),
                ("L4", 110_000.0, 165_000.0),
                ("L5", 145_000.0, 210_000.0),
                ("L6", 180_000.0, 280_000.0),
                ("L7", 230_000.0, 380_000.0),
            ],
            max_raise_pct: 20.0,
        }
    }

    fn band_for(&self, level: &str) -> Option<(f64, f64)> {
        self.bands
            .iter()
            .find(|(name, _, _)| *name == level)
            .map(|(_, min, max)| (*min, *max))
    }
}

impl Default for CompensationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for CompensationPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !["salary", "compensation", "offer", "raise", "adjustment"]
            .iter()
            .any(|a| action_lower.contains(a))
        {
            return self.meta.allow("Not a compensation action");
        }

        let Some(salary) = number_field_any(payload, &["salary", "compensation", "amount"]) else {
            return self.meta.allow("No salary specified");
        };
        let level = str_field(payload, "level").unwrap_or("L3");

        let Some((band_min, band_max)) = self.band_for(level) else {
            return self.meta.warn(format!("Unknown level {level}; band check skipped"));
        };

        if salary < band_min {
            return self.meta.warn(format!(
                "Salary ${salary:.0} below band minimum for {level} (${band_min:.0})"
            ));
        }

        if salary > band_max {
            return self.meta.escalate(
                format!("Salary ${salary:.0} exceeds band maximum for {level} (${band_max:.0})"),
                Some("Requires VP/HR approval for above-band compensation".to_string()),
            );
        }

        if let Some(current) = number_field_any(payload, &["current_salary"]) {
            if current > 0.0 {
                let increase_pct = (salary - current) / current * 100.0;
                if increase_pct > self.max_raise_pct {
                    return self.meta.escalate(
                        format!(
                            "Salary increase of {increase_pct:.1}% exceeds {:.0}% threshold",
                            self.max_raise_pct
                        ),
                        Some("Requires executive approval for large increases".to_string()),
                    );
                }
            }
        }

        self.meta.allow(format!(
            "Compensation within {level} band (${band_min:.0}-${band_max:.0})"
        ))
    }
}

/// Termination documentation and review requirements.
pub struct TerminationPolicy {
    meta: PolicyMeta,
    required_docs: Vec<&'static str>,
}

impl TerminationPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "HR-003",
                "Termination Policy",
                PolicyCategory::Termination,
                PolicySeverity::High,
            ),
            required_docs: vec!["performance_records", "warnings", "pip"],
        }
    }
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for TerminationPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !action_lower.contains("terminate") && !action_lower.contains("offboard") {
            return self.meta.allow("Not a termination action");
        }

        let termination_type = str_field(payload, "type").unwrap_or("voluntary");
        let documentation: Vec<&str> = payload
            .get("documentation")
            .and_then(|v| v.as_array())
            .map(|docs| docs.iter().filter_map(|d| d.as_str()).collect())
            .unwrap_or_default();

        if termination_type == "involuntary" {
            let missing: Vec<&str> = self
                .required_docs
                .iter()
                .filter(|doc| !documentation.contains(*doc))
                .copied()
                .collect();

            if !missing.is_empty() {
                return self.meta.deny(
                    format!("Involuntary termination requires documentation: {missing:?}"),
                    Some(format!("Provide: {}", missing.join(", "))),
                );
            }

            if !bool_field(payload, "legal_reviewed") {
                return self.meta.escalate(
                    "Involuntary terminations require legal review",
                    Some("Submit to legal for review before proceeding".to_string()),
                );
            }
        }

        if !bool_field(payload, "hr_reviewed") {
            return self.meta.escalate(
                "All terminations require HR review",
                Some("Submit to HR for review".to_string()),
            );
        }

        if bool_field(payload, "protected_class_flag") {
            return self.meta.deny(
                "Termination flagged for protected class review",
                Some("Requires additional HR and legal review".to_string()),
            );
        }

        self.meta.allow("Termination compliance requirements met")
    }
}

/// Leave and PTO compliance, including FMLA handling.
pub struct LeaveManagementPolicy {
    meta: PolicyMeta,
    manager_approval_days: f64,
}

impl LeaveManagementPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "HR-004",
                "Leave Management Policy",
                PolicyCategory::LeaveManagement,
                PolicySeverity::Medium,
            ),
            manager_approval_days: 10.0,
        }
    }
}

impl Default for LeaveManagementPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for LeaveManagementPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !action_lower.contains("leave") && !action_lower.contains("pto") {
            return self.meta.allow("Not a leave action");
        }

        if bool_field(payload, "fmla") {
            if !bool_field(payload, "fmla_certified") {
                return self.meta.escalate(
                    "FMLA leave requires certification",
                    Some("Submit FMLA certification documentation".to_string()),
                );
            }
            return self.meta.allow("FMLA leave request - protected leave");
        }

        let days = number_field_any(payload, &["days"]).unwrap_or(0.0);
        let balance = number_field_any(payload, &["balance"]).unwrap_or(0.0);

        if days > balance {
            return self.meta.deny(
                format!("Insufficient leave balance ({balance} days available, {days} requested)"),
                Some("Request fewer days or apply for unpaid leave".to_string()),
            );
        }

        if days > self.manager_approval_days && !bool_field(payload, "manager_approved") {
            return self.meta.escalate(
                format!(
                    "Leave over {:.0} days requires manager approval",
                    self.manager_approval_days
                ),
                Some("Submit for manager approval".to_string()),
            );
        }

        self.meta.allow("Leave request compliant")
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
    fn test_onboarding_without_i9_denied() {
        let policy = HiringCompliancePolicy::new();
        let result = policy.evaluate(
            "onboard_employee",
            &payload(serde_json::json!({"candidate": "jordan"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.contains("I-9"));
    }

    #[test]
    fn test_offer_generation_not_subject_to_i9() {
        let policy = HiringCompliancePolicy::new();
        let result = policy.evaluate(
            "generate_offer",
            &payload(serde_json::json!({"level": "L3", "salary": 100_000})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_finance_role_needs_background_check() {
        let policy = HiringCompliancePolicy::new();
        let result = policy.evaluate(
            "onboard_employee",
            &payload(serde_json::json!({
                "i9_status": "verified",
                "role_type": "finance",
                "offer_signed": true
            })),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.contains("Background check"));
    }

    #[test]
    fn test_compliant_onboarding_allowed() {
        let policy = HiringCompliancePolicy::new();
        let result = policy.evaluate(
            "onboard_employee",
            &payload(serde_json::json!({
                "i9_status": "verified",
                "background_check_complete": true,
                "offer_signed": true
            })),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_salary_above_band_escalates_to_vp_hr() {
        let policy = CompensationPolicy::new();
        let result = policy.evaluate(
            "generate_offer",
            &payload(serde_json::json!({"level": "L3", "salary": 200_000})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
        assert!(result.reason.contains("exceeds band maximum for L3"));
        assert!(result.suggestion.as_deref().unwrap().contains("VP/HR"));
    }

    #[test]
    fn test_salary_below_band_warns() {
        let policy = CompensationPolicy::new();
        let result = policy.evaluate(
            "generate_offer",
            &payload(serde_json::json!({"level": "L5", "salary": 100_000})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Warn);
    }

    #[test]
    fn test_salary_within_band_allowed() {
        let policy = CompensationPolicy::new();
        let result = policy.evaluate(
            "generate_offer",
            &payload(serde_json::json!({"level": "L4", "salary": 140_000})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_large_raise_escalates() {
        let policy = CompensationPolicy::new();
        let result = policy.evaluate(
            "salary_adjustment",
            &payload(serde_json::json!({
                "level": "L4",
                "salary": 160_000,
                "current_salary": 120_000
            })),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
        assert!(result.reason.contains("33.3%"));
    }

    #[test]
    fn test_involuntary_termination_needs_documentation() {
        let policy = TerminationPolicy::new();
        let result = policy.evaluate(
            "terminate_employee",
            &payload(serde_json::json!({"type": "involuntary", "documentation": ["warnings"]})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.contains("performance_records"));
    }

    #[test]
    fn test_voluntary_termination_needs_hr_review() {
        let policy = TerminationPolicy::new();
        let result = policy.evaluate(
            "offboard_employee",
            &payload(serde_json::json!({"type": "voluntary"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
        assert!(result.reason.contains("HR review"));
    }

    #[test]
    fn test_protected_class_flag_denies_after_reviews() {
        let policy = TerminationPolicy::new();
        let result = policy.evaluate(
            "terminate_employee",
            &payload(serde_json::json!({
                "hr_reviewed": true,
                "protected_class_flag": true
            })),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.contains("protected class"));
    }

    #[test]
    fn test_missing_hr_review_escalates_before_flag_check() {
        let policy = TerminationPolicy::new();
        let result = policy.evaluate(
            "terminate_employee",
            &payload(serde_json::json!({"protected_class_flag": true})),
            &PolicyContext::default(),
        );
        // HR review is requested first; the flag is only reached afterwards.
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
        assert!(result.reason.contains("HR review"));
    }

    #[test]
    fn test_leave_beyond_balance_denied() {
        let policy = LeaveManagementPolicy::new();
        let result = policy.evaluate(
            "request_leave",
            &payload(serde_json::json!({"days": 15, "balance": 8})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
    }

    #[test]
    fn test_fmla_leave_protected_once_certified() {
        let policy = LeaveManagementPolicy::new();
        let result = policy.evaluate(
            "request_leave",
            &payload(serde_json::json!({"fmla": true, "fmla_certified": true})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }
}
