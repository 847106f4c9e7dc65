//! The closed capability set and the action matcher.
//!
//! Capabilities are a versioned, closed identifier set; free-form action
//! strings resolve through a declarative alias table first, so common
//! lookups are O(1) and exhaustive, with substring and token-overlap
//! matching as ordered fallbacks for ad-hoc phrasing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Every capability an enterprise agent may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    // Finance
    ProcessExpense,
    ApproveExpense,
    CreateBudget,
    TrackSpending,
    VerifyInvoice,
    SchedulePayment,
    GenerateAuditReport,
    ReconcileAccounts,

    // Legal
    ReviewContract,
    DraftNda,
    CheckIp,
    LitigationSearch,
    ApproveTerms,

    // IT
    ProvisionAccess,
    RevokeAccess,
    CreateTicket,
    ResolveIncident,
    DeployChange,
    AssetManagement,

    // HR
    SearchCandidates,
    ScreenResume,
    ScheduleInterview,
    GenerateOffer,
    VerifyI9,
    OnboardEmployee,
    OffboardEmployee,
    ProcessPayroll,

    // Procurement
    ApproveVendor,
    CreatePo,
    ManageBid,
    InventoryCheck,
    ReceiveGoods,

    // Operations
    CreateIncident,
    ManageChange,
    SlaMonitoring,
    ScheduleMaintenance,

    // Communications
    SendEmail,
    SendNotification,
}

/// All capabilities in declaration order. Matching iterates this slice, so
/// fallback resolution is deterministic.
pub const ALL_CAPABILITIES: &[Capability] = &[
    Capability::ProcessExpense,
    Capability::ApproveExpense,
    Capability::CreateBudget,
    Capability::TrackSpending,
    Capability::VerifyInvoice,
    Capability::SchedulePayment,
    Capability::GenerateAuditReport,
    Capability::ReconcileAccounts,
    Capability::ReviewContract,
    Capability::DraftNda,
    Capability::CheckIp,
    Capability::LitigationSearch,
    Capability::ApproveTerms,
    Capability::ProvisionAccess,
    Capability::RevokeAccess,
    Capability::CreateTicket,
    Capability::ResolveIncident,
    Capability::DeployChange,
    Capability::AssetManagement,
    Capability::SearchCandidates,
    Capability::ScreenResume,
    Capability::ScheduleInterview,
    Capability::GenerateOffer,
    Capability::VerifyI9,
    Capability::OnboardEmployee,
    Capability::OffboardEmployee,
    Capability::ProcessPayroll,
    Capability::ApproveVendor,
    Capability::CreatePo,
    Capability::ManageBid,
    Capability::InventoryCheck,
    Capability::ReceiveGoods,
    Capability::CreateIncident,
    Capability::ManageChange,
    Capability::SlaMonitoring,
    Capability::ScheduleMaintenance,
    Capability::SendEmail,
    Capability::SendNotification,
];

impl Capability {
    /// Stable string identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessExpense => "process_expense",
            Self::ApproveExpense => "approve_expense",
            Self::CreateBudget => "create_budget",
            Self::TrackSpending => "track_spending",
            Self::VerifyInvoice => "verify_invoice",
            Self::SchedulePayment => "schedule_payment",
            Self::GenerateAuditReport => "generate_audit_report",
            Self::ReconcileAccounts => "reconcile_accounts",
            Self::ReviewContract => "review_contract",
            Self::DraftNda => "draft_nda",
            Self::CheckIp => "check_ip",
            Self::LitigationSearch => "litigation_search",
            Self::ApproveTerms => "approve_terms",
            Self::ProvisionAccess => "provision_access",
            Self::RevokeAccess => "revoke_access",
            Self::CreateTicket => "create_ticket",
            Self::ResolveIncident => "resolve_incident",
            Self::DeployChange => "deploy_change",
            Self::AssetManagement => "asset_management",
            Self::SearchCandidates => "search_candidates",
            Self::ScreenResume => "screen_resume",
            Self::ScheduleInterview => "schedule_interview",
            Self::GenerateOffer => "generate_offer",
            Self::VerifyI9 => "verify_i9",
            Self::OnboardEmployee => "onboard_employee",
            Self::OffboardEmployee => "offboard_employee",
            Self::ProcessPayroll => "process_payroll",
            Self::ApproveVendor => "approve_vendor",
            Self::CreatePo => "create_po",
            Self::ManageBid => "manage_bid",
            Self::InventoryCheck => "inventory_check",
            Self::ReceiveGoods => "receive_goods",
            Self::CreateIncident => "create_incident",
            Self::ManageChange => "manage_change",
            Self::SlaMonitoring => "sla_monitoring",
            Self::ScheduleMaintenance => "schedule_maintenance",
            Self::SendEmail => "send_email",
            Self::SendNotification => "send_notification",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_CAPABILITIES
            .iter()
            .find(|cap| cap.as_str() == s)
            .copied()
            .ok_or(())
    }
}

/// Resolves free-form action strings to capabilities.
///
/// Resolution order: exact identifier, alias table, substring containment,
/// token overlap. Each stage iterates capabilities in declaration order,
/// so results are deterministic.
pub struct CapabilityMatcher {
    exact: HashMap<&'static str, Capability>,
    aliases: HashMap<&'static str, Capability>,
}

impl Default for CapabilityMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityMatcher {
    pub fn new() -> Self {
        let exact = ALL_CAPABILITIES
            .iter()
            .map(|cap| (cap.as_str(), *cap))
            .collect();

        // Declarative alias table for the action phrasings seen in the wild.
        let aliases = HashMap::from([
            ("submit_expense", Capability::ProcessExpense),
            ("expense_report", Capability::ProcessExpense),
            ("process_payment", Capability::SchedulePayment),
            ("pay_invoice", Capability::SchedulePayment),
            ("process_invoice", Capability::VerifyInvoice),
            ("modify_budget", Capability::CreateBudget),
            ("audit_report", Capability::GenerateAuditReport),
            ("nda", Capability::DraftNda),
            ("contract_review", Capability::ReviewContract),
            ("grant_access", Capability::ProvisionAccess),
            ("modify_permissions", Capability::ProvisionAccess),
            ("remove_access", Capability::RevokeAccess),
            ("open_ticket", Capability::CreateTicket),
            ("hire", Capability::OnboardEmployee),
            ("start_onboarding", Capability::OnboardEmployee),
            ("start_employment", Capability::OnboardEmployee),
            ("terminate_employee", Capability::OffboardEmployee),
            ("make_offer", Capability::GenerateOffer),
            ("create_offer", Capability::GenerateOffer),
            ("run_payroll", Capability::ProcessPayroll),
            ("create_purchase_order", Capability::CreatePo),
            ("purchase_order", Capability::CreatePo),
            ("check_inventory", Capability::InventoryCheck),
            ("send_message", Capability::SendEmail),
            ("email", Capability::SendEmail),
            ("notify", Capability::SendNotification),
        ]);

        Self { exact, aliases }
    }

    fn normalize(action: &str) -> String {
        action
            .to_lowercase()
            .replace([' ', '-'], "_")
            .trim_matches('_')
            .to_string()
    }

    /// Resolve an action string, if any capability matches.
    pub fn resolve(&self, action: &str) -> Option<Capability> {
        let normalized = Self::normalize(action);

        if let Some(cap) = self.exact.get(normalized.as_str()) {
            return Some(*cap);
        }
        if let Some(cap) = self.aliases.get(normalized.as_str()) {
            return Some(*cap);
        }

        // Substring containment in declaration order.
        for cap in ALL_CAPABILITIES {
            let id = cap.as_str();
            if normalized.contains(id) || id.contains(normalized.as_str()) {
                return Some(*cap);
            }
        }

        // Token overlap, skipping generic verbs that would match half the
        // capability set.
        const GENERIC: &[&str] = &["create", "process", "approve", "manage", "schedule", "check"];
        let tokens: Vec<&str> = normalized
            .split('_')
            .filter(|t| !t.is_empty() && !GENERIC.contains(t))
            .collect();
        if tokens.is_empty() {
            return None;
        }
        for cap in ALL_CAPABILITIES {
            let cap_tokens: Vec<&str> = cap.as_str().split('_').collect();
            if tokens.iter().any(|t| cap_tokens.contains(t)) {
                return Some(*cap);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let matcher = CapabilityMatcher::new();
        assert_eq!(matcher.resolve("approve_expense"), Some(Capability::ApproveExpense));
        assert_eq!(matcher.resolve("send_email"), Some(Capability::SendEmail));
    }

    #[test]
    fn test_alias_match() {
        let matcher = CapabilityMatcher::new();
        assert_eq!(matcher.resolve("hire"), Some(Capability::OnboardEmployee));
        assert_eq!(
            matcher.resolve("create_purchase_order"),
            Some(Capability::CreatePo)
        );
        assert_eq!(matcher.resolve("send_message"), Some(Capability::SendEmail));
    }

    #[test]
    fn test_normalization() {
        let matcher = CapabilityMatcher::new();
        assert_eq!(matcher.resolve("Approve Expense"), Some(Capability::ApproveExpense));
        assert_eq!(matcher.resolve("approve-expense"), Some(Capability::ApproveExpense));
    }

    #[test]
    fn test_substring_match() {
        let matcher = CapabilityMatcher::new();
        assert_eq!(
            matcher.resolve("urgent_review_contract_today"),
            Some(Capability::ReviewContract)
        );
    }

    #[test]
    fn test_token_overlap_fallback() {
        let matcher = CapabilityMatcher::new();
        assert_eq!(matcher.resolve("expense_audit"), Some(Capability::ProcessExpense));
    }

    #[test]
    fn test_no_match_for_unknown() {
        let matcher = CapabilityMatcher::new();
        assert_eq!(matcher.resolve("levitate_building"), None);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let matcher = CapabilityMatcher::new();
        let first = matcher.resolve("expense");
        for _ in 0..10 {
            assert_eq!(matcher.resolve("expense"), first);
        }
    }

    #[test]
    fn test_round_trip_from_str() {
        for cap in ALL_CAPABILITIES {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), *cap);
        }
    }
}
