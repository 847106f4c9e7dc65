//! Built-in domain policy set.
//!
//! Finance, legal, HR, IT/security, procurement, and privacy policies in
//! the shapes the enterprise actually runs: approval ladders, registries
//! of approved counterparties, documentation requirements, and PII
//! redaction.

pub mod finance;
pub mod hr;
pub mod it;
pub mod legal;
pub mod privacy;
pub mod procurement;

use std::sync::Arc;

use crate::policy::Policy;

pub use finance::{BudgetControlPolicy, ExpenseLimitPolicy, ReceiptRequiredPolicy};
pub use hr::{CompensationPolicy, HiringCompliancePolicy, LeaveManagementPolicy, TerminationPolicy};
pub use it::{AccessControlPolicy, ChangeManagementPolicy, DataClassificationPolicy};
pub use legal::{ContractReviewPolicy, IpProtectionPolicy, LitigationHoldPolicy, NdaEnforcementPolicy};
pub use privacy::{InclusiveLanguagePolicy, PiiRedactionPolicy};
pub use procurement::{PurchaseOrderPolicy, VendorApprovalPolicy};

/// The full built-in policy set, in deterministic evaluation order.
pub fn default_policies() -> Vec<Arc<dyn Policy>> {
    vec![
        // Finance
        Arc::new(ReceiptRequiredPolicy::new()),
        Arc::new(ExpenseLimitPolicy::new()),
        Arc::new(BudgetControlPolicy::new()),
        // Legal
        Arc::new(ContractReviewPolicy::new()),
        Arc::new(NdaEnforcementPolicy::new()),
        Arc::new(IpProtectionPolicy::new()),
        Arc::new(LitigationHoldPolicy::new()),
        // HR
        Arc::new(HiringCompliancePolicy::new()),
        Arc::new(CompensationPolicy::new()),
        Arc::new(TerminationPolicy::new()),
        Arc::new(LeaveManagementPolicy::new()),
        // IT / Security
        Arc::new(AccessControlPolicy::new()),
        Arc::new(DataClassificationPolicy::new()),
        Arc::new(ChangeManagementPolicy::new()),
        // Procurement
        Arc::new(VendorApprovalPolicy::new()),
        Arc::new(PurchaseOrderPolicy::new()),
        // Privacy / Communications
        Arc::new(PiiRedactionPolicy::new()),
        Arc::new(InclusiveLanguagePolicy::new()),
    ]
}
