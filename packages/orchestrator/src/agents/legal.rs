//! Legal domain agent: contracts, NDAs, IP checks, litigation search.

use async_trait::async_trait;

use citadel_compliance::{number_field_any, str_field, Payload, PolicyCategory, PolicyContext};

use crate::agent::{ActionHandler, AgentDescriptor, AgentError};
use crate::capability::Capability;

/// Simulated legal department.
#[derive(Debug, Default)]
pub struct LegalAgent;

impl LegalAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionHandler for LegalAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            agent_id: "legal_agent".into(),
            agent_type: "legal".into(),
            display_name: "Legal".into(),
            capabilities: vec![
                Capability::ReviewContract,
                Capability::DraftNda,
                Capability::CheckIp,
                Capability::LitigationSearch,
                Capability::ApproveTerms,
            ],
            policy_categories: vec![
                PolicyCategory::ContractReview,
                PolicyCategory::NdaEnforcement,
                PolicyCategory::IpProtection,
                PolicyCategory::LitigationHold,
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
            Capability::ReviewContract => {
                let value = number_field_any(payload, &["value", "amount"]).unwrap_or(0.0);
                serde_json::json!({
                    "status": "reviewed",
                    "value": value,
                    "risk_rating": if value > 100_000.0 { "high" } else { "standard" },
                    "clauses_flagged": [],
                })
            }
            Capability::DraftNda => serde_json::json!({
                "status": "drafted",
                "counterparty": str_field(payload, "counterparty").unwrap_or("unspecified"),
                "term_months": 24,
                "mutual": true,
            }),
            Capability::CheckIp => serde_json::json!({
                "status": "checked",
                "conflicts_found": false,
                "jurisdictions": ["us", "eu"],
            }),
            Capability::LitigationSearch => serde_json::json!({
                "status": "searched",
                "matters_found": 0,
                "query": str_field(payload, "query").unwrap_or(""),
            }),
            Capability::ApproveTerms => serde_json::json!({
                "status": "approved",
                "redlines": 0,
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
