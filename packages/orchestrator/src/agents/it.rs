//! IT domain agent: access provisioning, tickets, incidents, deploys.

use async_trait::async_trait;

use citadel_compliance::{str_field, Payload, PolicyCategory, PolicyContext};

use crate::agent::{ActionHandler, AgentDescriptor, AgentError};
use crate::capability::Capability;

/// Simulated IT service desk.
#[derive(Debug, Default)]
pub struct ItAgent;

impl ItAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionHandler for ItAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            agent_id: "it_agent".into(),
            agent_type: "it".into(),
            display_name: "IT".into(),
            capabilities: vec![
                Capability::ProvisionAccess,
                Capability::RevokeAccess,
                Capability::CreateTicket,
                Capability::ResolveIncident,
                Capability::DeployChange,
                Capability::AssetManagement,
            ],
            policy_categories: vec![
                PolicyCategory::AccessControl,
                PolicyCategory::DataClassification,
                PolicyCategory::ChangeManagement,
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
        let user = str_field(payload, "user").unwrap_or("unspecified");

        let result = match capability {
            Capability::ProvisionAccess => serde_json::json!({
                "status": "provisioned",
                "user": user,
                "systems": payload.get("systems").cloned().unwrap_or(serde_json::json!([])),
                "expires_in_days": 90,
            }),
            Capability::RevokeAccess => serde_json::json!({
                "status": "revoked",
                "user": user,
            }),
            Capability::CreateTicket => serde_json::json!({
                "status": "created",
                "ticket_id": "TKT-10001",
                "priority": str_field(payload, "priority").unwrap_or("medium"),
            }),
            Capability::ResolveIncident => serde_json::json!({
                "status": "resolved",
                "incident_id": str_field(payload, "incident_id").unwrap_or("INC-0"),
                "root_cause": "configuration drift",
            }),
            Capability::DeployChange => serde_json::json!({
                "status": "deployed",
                "environment": str_field(payload, "environment").unwrap_or("staging"),
                "rollback_ready": true,
            }),
            Capability::AssetManagement => serde_json::json!({
                "status": "updated",
                "assets_tracked": 1,
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
