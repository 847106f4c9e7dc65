//! Procurement policies: approved vendor registry, purchase orders.

use std::collections::HashSet;

use parking_lot::RwLock;

use crate::policy::{
    number_field_any, str_field, str_field_any, Payload, Policy, PolicyCategory, PolicyContext,
    PolicyMeta, PolicyResult, PolicySeverity,
};

/// Purchases and invoices must name an approved vendor.
pub struct VendorApprovalPolicy {
    meta: PolicyMeta,
    approved: RwLock<HashSet<String>>,
}

impl VendorApprovalPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "PROC-001",
                "Vendor Approval Policy",
                PolicyCategory::VendorApproval,
                PolicySeverity::High,
            ),
            approved: RwLock::new(HashSet::new()),
        }
    }

    /// Add a vendor to the approved list.
    pub fn approve_vendor(&self, vendor: impl Into<String>) {
        self.approved.write().insert(vendor.into());
    }

    pub fn is_approved(&self, vendor: &str) -> bool {
        self.approved.read().contains(vendor)
    }
}

impl Default for VendorApprovalPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for VendorApprovalPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();

        // Vendor onboarding itself is the approval path.
        if action_lower.contains("approve_vendor") {
            return self.meta.allow("Vendor onboarding action");
        }

        if !["create_purchase_order", "create_po", "process_invoice", "receive_goods"]
            .iter()
            .any(|a| action_lower.contains(a))
        {
            return self.meta.allow("Not a procurement action");
        }

        let Some(vendor) = str_field(payload, "vendor") else {
            return self.meta.warn("No vendor named on procurement action");
        };

        if !self.is_approved(vendor) {
            return self.meta.deny(
                format!("Vendor '{vendor}' is not on the approved vendor list"),
                Some(format!("Complete vendor onboarding for '{vendor}' first")),
            );
        }

        self.meta.allow(format!("Vendor '{vendor}' approved"))
    }
}

/// Purchases over the PO threshold need a purchase order.
pub struct PurchaseOrderPolicy {
    meta: PolicyMeta,
    po_threshold: f64,
}

impl PurchaseOrderPolicy {
    pub fn new() -> Self {
        Self {
            meta: PolicyMeta::new(
                "PROC-002",
                "Spending Limits Policy",
                PolicyCategory::SpendingLimits,
                PolicySeverity::Medium,
            ),
            po_threshold: 10_000.0,
        }
    }
}

impl Default for PurchaseOrderPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for PurchaseOrderPolicy {
    fn meta(&self) -> &PolicyMeta {
        &self.meta
    }

    fn evaluate(&self, action: &str, payload: &Payload, _context: &PolicyContext) -> PolicyResult {
        let action_lower = action.to_lowercase();
        if !["purchase", "invoice", "procurement"]
            .iter()
            .any(|a| action_lower.contains(a))
        {
            return self.meta.allow("Not a purchasing action");
        }

        let Some(amount) = number_field_any(payload, &["amount", "value"]) else {
            return self.meta.allow("No amount specified");
        };

        let has_po = str_field_any(payload, &["purchase_order", "po_number"]).is_some();
        if amount > self.po_threshold && !has_po {
            return self.meta.deny(
                format!(
                    "Purchase order required for amounts over ${:.0}",
                    self.po_threshold
                ),
                Some("Raise a purchase order before committing spend".to_string()),
            );
        }

        self.meta.allow("Purchase order requirements met")
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
    fn test_unapproved_vendor_denied() {
        let policy = VendorApprovalPolicy::new();
        let result = policy.evaluate(
            "create_purchase_order",
            &payload(serde_json::json!({"vendor": "shadow-llc", "amount": 500})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.contains("shadow-llc"));
    }

    #[test]
    fn test_approved_vendor_allowed() {
        let policy = VendorApprovalPolicy::new();
        policy.approve_vendor("acme-supplies");
        let result = policy.evaluate(
            "create_purchase_order",
            &payload(serde_json::json!({"vendor": "acme-supplies", "amount": 500})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_vendor_onboarding_not_gated_on_itself() {
        let policy = VendorApprovalPolicy::new();
        let result = policy.evaluate(
            "approve_vendor",
            &payload(serde_json::json!({"vendor": "new-vendor"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_large_purchase_without_po_denied() {
        let policy = PurchaseOrderPolicy::new();
        let result = policy.evaluate(
            "create_purchase_order",
            &payload(serde_json::json!({"amount": 15_000})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Deny);
        assert!(result.reason.contains("Purchase order required"));
    }

    #[test]
    fn test_large_purchase_with_po_allowed() {
        let policy = PurchaseOrderPolicy::new();
        let result = policy.evaluate(
            "create_purchase_order",
            &payload(serde_json::json!({"amount": 15_000, "po_number": "PO-8842"})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }

    #[test]
    fn test_small_purchase_needs_no_po() {
        let policy = PurchaseOrderPolicy::new();
        let result = policy.evaluate(
            "process_invoice",
            &payload(serde_json::json!({"amount": 2_000})),
            &PolicyContext::default(),
        );
        assert_eq!(result.verdict, PolicyVerdict::Allow);
    }
}
