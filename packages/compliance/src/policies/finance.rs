//! Financial compliance policies: receipts, approval ladders, budgets.

use crate::policy::{
    bool_field_any, number_field_any, Payload, Policy, PolicyCategory, PolicyContext, PolicyMeta,
    PolicyResult, PolicySeverity,
};

fn is_expense_action(action: &str) -> bool {
    let action = action.to_lowercase();
    ["approve_expense", "process_expense", "submit_expense"]
        .iter()
        .any(|a| action.contains(a))
        || action.contains("expense")
}

/// Receipts required for expenses over the fraud-prevention threshold.
pub struct ReceiptRequiredPolicy {
    meta: PolicyMeta,
    receipt_threshold: f64,
}

impl ReceiptRequiredPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "FIN-001",
                "Fraud Prevention Policy",
                PolicyCategory::FraudPrevention,
                PolicySeverity::High,
            ),
            receipt_threshold: 50.0,
        }
    }
}

impl Default for ReceiptRequiredPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for ReceiptRequiredPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        if !is_expense_action(action) {
            return self.meta.allow("Not an expense action");
        }

        let amount = number_field_any(payload, &["amount"]).unwrap_or(0.0);
        let has_receipt = bool_field_any(payload, &["has_receipt", "receipt"]);

        if amount > self.receipt_threshold && !has_receipt {
            return self.meta.deny(
                format!(
                    "Receipt required for expenses over ${:.0}",
                    self.receipt_threshold
                ),
                Some("Attach a receipt and resubmit the expense".to_string()),
            );
        }

        self.meta.allow("Receipt requirements met")
    }
}

/// Expense approval ladder: director review and CFO escalation.
pub struct ExpenseLimitPolicy {
    meta: PolicyMeta,
    director_threshold: f64,
    cfo_threshold: f64,
}

impl ExpenseLimitPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "FIN-002",
                "Expense Limits Policy",
                PolicyCategory::ExpenseLimits,
                PolicySeverity::Medium,
            ),
            director_threshold: 25_000.0,
            cfo_threshold: 100_000.0,
        }
    }
}

impl Default for ExpenseLimitPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for ExpenseLimitPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        if !is_expense_action(action) {
            return self.meta.allow("Not an expense action");
        }

        let Some(amount) = number_field_any(payload, &["amount"]) else {
            return self.meta.allow("No amount specified");
        };

        if amount > self.cfo_threshold {
            return self.meta.escalate(
                format!("Expense ${amount:.0} requires CFO approval"),
                Some("Route to CFO for sign-off".to_string()),
            );
        }

        if amount > self.director_threshold {
            return self
                .meta
                .warn(format!("Expense ${amount:.0} requires director review"));
        }

        self.meta.allow(format!("Expense ${amount:.0} within limits"))
    }
}

/// Overspend beyond 10% of budget is blocked.
pub struct BudgetControlPolicy {
    meta: PolicyMeta,
    overspend_limit: f64,
}

impl BudgetControlPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "FIN-003",
                "Budget Controls Policy",
                PolicyCategory::BudgetControls,
                PolicySeverity::High,
            ),
            overspend_limit: 0.10,
        }
    }
}

impl Default for BudgetControlPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for BudgetControlPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !action_lower.contains("budget") && !action_lower.contains("spend") {
            return self.meta.allow("Not a budget action");
        }

        let Some(budget) = number_field_any(payload, &["budget"]) else {
            return self.meta.allow("No budget specified");
        };
        let Some(projected) = number_field_any(payload, &["projected_spend", "spend", "amount"])
        else {
            return self.meta.allow("No projected spend specified");
        };

        if budget <= 0.0 {
            return self.meta.allow("Budget not set");
        }

        let overspend = (projected - budget) / budget;
        if overspend > self.overspend_limit {
            return self.meta.deny(
                format!(
                    "Projected spend ${projected:.0} exceeds budget ${budget:.0} by {:.0}% (limit {:.0}%)",
                    overspend * 100.0,
                    self.overspend_limit * 100.0
                ),
                Some("Request a budget amendment before committing spend".to_string()),
            );
        }

        if overspend > 0.0 {
            return self.meta.warn(format!(
                "Projected spend ${projected:.0} is over budget ${budget:.0}"
            ));
        }

        self.meta.allow("Spend within budget")
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
    fn test_small_expense_with_receipt_allowed() {
        let policy = ReceiptRequiredPolicy::new();
        let result = policy.evaluate(
            "approve_expense",
            &payload(serde_json::json!({"amount": 150, "has_receipt": true})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_missing_receipt_denied_with_reason() {
        let policy = ReceiptRequiredPolicy::new();
        let result = policy.evaluate(
            "approve_expense",
            &payload(serde_json::json!({"amount": 250})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.to_lowercase().contains("receipt"));
        assert!(result.suggestion.is_some());
    }

    #[test]
    fn test_tiny_expense_needs_no_receipt() {
        let policy = ReceiptRequiredPolicy::new();
        let result = policy.evaluate(
            "approve_expense",
            &payload(serde_json::json!({"amount": 20})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_cfo_escalation_over_100k() {
        let policy = ExpenseLimitPolicy::new();
        let result = policy.evaluate(
            "approve_expense",
            &payload(serde_json::json!({"amount": 150_000, "has_receipt": true})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Escalate);
        assert!(result.reason.contains("CFO"));
    }

    #[test]
    fn test_non_expense_action_ignored() {
        let policy = ReceiptRequiredPolicy::new();
        let result = policy.evaluate(
            "review_contract",
            &payload(serde_json::json!({"amount": 9999})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_overspend_beyond_limit_denied() {
        let policy = BudgetControlPolicy::new();
        let result = policy.evaluate(
            "modify_budget",
            &payload(serde_json::json!({"budget": 100_000, "projected_spend": 115_000})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
    }

    #[test]
    fn test_slight_overspend_warns() {
        let policy = BudgetControlPolicy::new();
        let result = policy.evaluate(
            "track_spending",
            &payload(serde_json::json!({"budget": 100_000, "projected_spend": 105_000})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Warn);
    }
}
