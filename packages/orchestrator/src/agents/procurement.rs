//! Procurement domain agent: vendors, purchase orders, inventory.

use async_trait::async_trait;

use citadel_compliance::{number_field_any, str_field, Payload, PolicyCategory, PolicyContext};

use crate::agent::{ActionHandler, AgentDescriptor, AgentError};
use crate::capability::Capability;

/// Simulated procurement office.
#[derive(Debug, Default)]
pub struct ProcurementAgent;

impl ProcurementAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionHandler for ProcurementAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            agent_id: "procurement_agent".into(),
            agent_type: "procurement".into(),
            display_name: "Procurement".into(),
            capabilities: vec![
                Capability::ApproveVendor,
                Capability::CreatePo,
                Capability::ManageBid,
                Capability::InventoryCheck,
                Capability::ReceiveGoods,
            ],
            policy_categories: vec![
                PolicyCategory::VendorApproval,
                PolicyCategory::SpendingLimits,
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
        let vendor = str_field(payload, "vendor").unwrap_or("unspecified");

        let result = match capability {
            Capability::ApproveVendor => serde_json::json!({
                "status": "approved",
                "vendor": vendor,
                "risk_tier": "standard",
            }),
            Capability::CreatePo => serde_json::json!({
                "status": "created",
                "vendor": vendor,
                "amount": number_field_any(payload, &["amount", "value"]).unwrap_or(0.0),
                "po_number": "PO-20001",
            }),
            Capability::ManageBid => serde_json::json!({
                "status": "managed",
                "bids_received": 3,
            }),
            Capability::InventoryCheck => serde_json::json!({
                "status": "checked",
                "sku": str_field(payload, "sku").unwrap_or("unspecified"),
                "on_hand": 42,
            }),
            Capability::ReceiveGoods => serde_json::json!({
                "status": "received",
                "vendor": vendor,
                "condition": "good",
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
