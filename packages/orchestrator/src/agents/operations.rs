//! Operations domain agent: incidents, change coordination, communications.

use async_trait::async_trait;

use citadel_compliance::{str_field, str_field_any, Payload, PolicyCategory, PolicyContext};

use crate::agent::{ActionHandler, AgentDescriptor, AgentError};
use crate::capability::Capability;

/// Simulated operations center; also owns outbound communications.
#[derive(Debug, Default)]
pub struct OperationsAgent;

impl OperationsAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionHandler for OperationsAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            agent_id: "operations_agent".into(),
            agent_type: "operations".into(),
            display_name: "Operations".into(),
            capabilities: vec![
                Capability::CreateIncident,
                Capability::ManageChange,
                Capability::SlaMonitoring,
                Capability::ScheduleMaintenance,
                Capability::SendEmail,
                Capability::SendNotification,
            ],
            policy_categories: vec![
                PolicyCategory::ChangeManagement,
                PolicyCategory::PiiProtection,
                PolicyCategory::Communications,
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
        let result = match capability {
            Capability::CreateIncident => serde_json::json!({
                "status": "created",
                "incident_id": "INC-30001",
                "severity": str_field(payload, "severity").unwrap_or("sev3"),
            }),
            Capability::ManageChange => serde_json::json!({
                "status": "coordinated",
                "change_window": "saturday_02_00",
            }),
            Capability::SlaMonitoring => serde_json::json!({
                "status": "monitored",
                "breaches": 0,
            }),
            Capability::ScheduleMaintenance => serde_json::json!({
                "status": "scheduled",
                "window": str_field(payload, "window").unwrap_or("next_weekend"),
            }),
            Capability::SendEmail => serde_json::json!({
                "status": "sent",
                "to": str_field_any(payload, &["to", "recipient"]).unwrap_or("unspecified"),
                "subject": str_field(payload, "subject").unwrap_or(""),
                "body": str_field_any(payload, &["body", "message", "content"]).unwrap_or(""),
            }),
            Capability::SendNotification => serde_json::json!({
                "status": "notified",
                "channel": str_field(payload, "channel").unwrap_or("ops"),
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
