//! HR domain agent: hiring pipeline, offers, onboarding, payroll.

use async_trait::async_trait;

use citadel_compliance::{number_field_any, str_field, Payload, PolicyCategory, PolicyContext};

use crate::agent::{ActionHandler, AgentDescriptor, AgentError};
use crate::capability::Capability;

/// Simulated HR department.
#[derive(Debug, Default)]
pub struct HrAgent;

impl HrAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ActionHandler for HrAgent {
    fn descriptor(&self) -> AgentDescriptor {
        AgentDescriptor {
            agent_id: "hr_agent".into(),
            agent_type: "hr".into(),
            display_name: "HR".into(),
            capabilities: vec![
                Capability::SearchCandidates,
                Capability::ScreenResume,
                Capability::ScheduleInterview,
                Capability::GenerateOffer,
                Capability::VerifyI9,
                Capability::OnboardEmployee,
                Capability::OffboardEmployee,
                Capability::ProcessPayroll,
            ],
            policy_categories: vec![
                PolicyCategory::HiringCompliance,
                PolicyCategory::Compensation,
                PolicyCategory::Termination,
                PolicyCategory::LeaveManagement,
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
        let candidate = str_field(payload, "candidate").unwrap_or("unspecified");

        let result = match capability {
            Capability::SearchCandidates => serde_json::json!({
                "status": "searched",
                "candidates_found": payload.get("count").cloned().unwrap_or(10.into()),
            }),
            Capability::ScreenResume => serde_json::json!({
                "status": "screened",
                "candidate": candidate,
                "recommendation": "advance",
            }),
            Capability::ScheduleInterview => serde_json::json!({
                "status": "scheduled",
                "candidate": candidate,
                "panel_size": 4,
            }),
            Capability::GenerateOffer => serde_json::json!({
                "status": "generated",
                "candidate": candidate,
                "level": str_field(payload, "level").unwrap_or("L3"),
                "salary": number_field_any(payload, &["salary"]).unwrap_or(0.0),
            }),
            Capability::VerifyI9 => serde_json::json!({
                "status": "verified",
                "candidate": candidate,
                "documents": ["passport"],
            }),
            Capability::OnboardEmployee => serde_json::json!({
                "status": "onboarded",
                "candidate": candidate,
                "start_date": "next_monday",
            }),
            Capability::OffboardEmployee => serde_json::json!({
                "status": "offboarded",
                "employee": str_field(payload, "employee").unwrap_or(candidate),
                "exit_interview": true,
            }),
            Capability::ProcessPayroll => serde_json::json!({
                "status": "processed",
                "period": str_field(payload, "period").unwrap_or("current"),
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
