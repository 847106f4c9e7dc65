//! Finance domain agent: expenses, budgets, invoices, payments.

use async_trait::async_trait;
use chrono::Utc;

use citadel_compliance::{number_field_any, Payload, PolicyCategory, PolicyContext};

use crate::agent::{ActionHandler, AgentDescriptor, AgentError};
use crate::capability::Capability;

/// Simulated finance back office.
#[derive(Debug, Default)]
pub struct FinanceAgent;

impl FinanceAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionHandler for FinanceAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            agent_id: "finance_agent".into(),
            agent_type: "finance".into(),
            display_name: "Finance".into(),
            capabilities: vec![
                Capability::ProcessExpense,
                Capability::ApproveExpense,
                Capability::CreateBudget,
                Capability::TrackSpending,
                Capability::VerifyInvoice,
                Capability::SchedulePayment,
                Capability::GenerateAuditReport,
                Capability::ReconcileAccounts,
            ],
            policy_categories: vec![
                PolicyCategory::ExpenseLimits,
                PolicyCategory::BudgetControls,
                PolicyCategory::InvoiceApproval,
                PolicyCategory::FraudPrevention,
            ],
        }
    }

    async fn handle(
        &self,
        capability: Capability,
        _action: &str,
        payload: &Payload,
        _context: &PolicyContext,
    ) -> Result<serde_json::Value, AgentError> {
        let amount = number_field_any(payload, &["amount"]).unwrap_or(0.0);

        let result = match capability {
            Capability::ProcessExpense | Capability::ApproveExpense => serde_json::json!({
                "status": "approved",
                "amount": amount,
                "reimbursement_date": Utc::now().date_naive().to_string(),
            }),
            Capability::CreateBudget => serde_json::json!({
                "status": "created",
                "budget": payload.get("budget").cloned().unwrap_or(amount.into()),
                "fiscal_year": Utc::now().format("%Y").to_string(),
            }),
            Capability::TrackSpending => serde_json::json!({
                "status": "tracked",
                "period": "current_quarter",
                "spend_to_date": amount,
            }),
            Capability::VerifyInvoice => serde_json::json!({
                "status": "verified",
                "invoice": payload.get("invoice_id").cloned().unwrap_or_default(),
                "amount": amount,
                "three_way_match": true,
            }),
            Capability::SchedulePayment => serde_json::json!({
                "status": "scheduled",
                "amount": amount,
                "method": "ach",
            }),
            Capability::GenerateAuditReport => serde_json::json!({
                "status": "generated",
                "findings": 0,
                "period": payload.get("period").cloned().unwrap_or("quarter".into()),
            }),
            Capability::ReconcileAccounts => serde_json::json!({
                "status": "reconciled",
                "discrepancies": 0,
            }),
            other => {
                return Err(AgentError::Unsupported {
                    action: other.as_str().to_string(),
                })
            }
        };

        Ok(result)
    }
}
