//! Capability-based routing.
//!
//! The routing table is copy-on-write: lookups clone an `Arc` snapshot and
//! proceed lock-free; registration rebuilds the table and swaps it under a
//! writer lock. Candidates are scored on status, current risk, and block
//! rate; killed agents never receive work.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use citadel_tirs::AgentStatus;

use crate::agent::Agent;
use crate::capability::{Capability, CapabilityMatcher};
use crate::error::OrchestratorError;

/// Immutable routing table snapshot.
#[derive(Default)]
struct RouteTable {
    /// Agents in registration order
    agents: Vec<Arc<Agent>>,
    by_id: HashMap<String, Arc<Agent>>,
    /// Capability to agent ids, registration order preserved
    by_capability: HashMap<Capability, Vec<String>>,
}

/// Outcome of one routing decision.
#[derive(Clone)]
pub struct RouteDecision {
    pub agent: Option<Arc<Agent>>,
    pub capability: Option<Capability>,
    /// Other live candidates, best first omitted
    pub alternatives: Vec<String>,
}

/// Per-agent routing health summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    pub agent_id: String,
    pub agent_type: String,
    pub status: AgentStatus,
    pub risk_score: f64,
    pub block_rate: f64,
}

/// Routes actions to the healthiest agent advertising the capability.
pub struct CapabilityRouter {
    matcher: CapabilityMatcher,
    table: RwLock<Arc<RouteTable>>,
}

impl Default for CapabilityRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRouter {
    pub fn new() -> Self {
        Self {
            matcher: CapabilityMatcher::new(),
            table: RwLock::new(Arc::new(RouteTable::default())),
        }
    }

    /// Register an agent. Rebuilds and swaps the routing snapshot.
    pub fn register(&self, agent: Arc<Agent>) -> Result<(), OrchestratorError> {
        let mut guard = self.table.write();
        if guard.by_id.contains_key(agent.agent_id()) {
            return Err(OrchestratorError::DuplicateAgent {
                agent_id: agent.agent_id().to_string(),
            });
        }

        let mut table = RouteTable {
            agents: guard.agents.clone(),
            by_id: guard.by_id.clone(),
            by_capability: guard.by_capability.clone(),
        };

        for capability in &agent.descriptor().capabilities {
            table
                .by_capability
                .entry(*capability)
                .or_default()
                .push(agent.agent_id().to_string());
        }
        table.by_id.insert(agent.agent_id().to_string(), Arc::clone(&agent));
        table.agents.push(Arc::clone(&agent));

        tracing::info!(
            agent_id = %agent.agent_id(),
            capabilities = agent.descriptor().capabilities.len(),
            "Agent registered with router"
        );

        *guard = Arc::new(table);
        Ok(())
    }

    fn snapshot(&self) -> Arc<RouteTable> {
        Arc::clone(&self.table.read())
    }

    /// Route an action to the best live agent for its capability.
    pub fn route(&self, action: &str) -> RouteDecision {
        let Some(capability) = self.matcher.resolve(action) else {
            return RouteDecision {
                agent: None,
                capability: None,
                alternatives: Vec::new(),
            };
        };

        let table = self.snapshot();
        let candidate_ids = table
            .by_capability
            .get(&capability)
            .cloned()
            .unwrap_or_default();

        let mut best: Option<(Arc<Agent>, f64)> = None;
        let mut alternatives = Vec::new();

        for id in &candidate_ids {
            let Some(agent) = table.by_id.get(id) else {
                continue;
            };
            let status = agent.status();
            if status == AgentStatus::Killed {
                continue;
            }

            let status_score = match status {
                AgentStatus::Active | AgentStatus::Resurrected => 10.0,
                AgentStatus::Throttled => 5.0,
                AgentStatus::Paused => 0.0,
                AgentStatus::Killed => unreachable!(),
            };
            let score = status_score
                + (10.0 - 10.0 * agent.risk_score())
                + (10.0 - 10.0 * agent.block_rate());

            // Strict comparison keeps registration order on ties.
            let replace = best.as_ref().map_or(true, |(_, best_score)| score > *best_score);
            if replace {
                if let Some((previous, _)) = best.take() {
                    alternatives.push(previous.agent_id().to_string());
                }
                best = Some((Arc::clone(agent), score));
            } else {
                alternatives.push(id.clone());
            }
        }

        RouteDecision {
            agent: best.map(|(agent, _)| agent),
            capability: Some(capability),
            alternatives,
        }
    }

    /// First registered agent of a type, regardless of status.
    pub fn find_by_type(&self, agent_type: &str) -> Option<Arc<Agent>> {
        self.snapshot()
            .agents
            .iter()
            .find(|agent| agent.agent_type() == agent_type)
            .cloned()
    }

    /// Agent lookup by id.
    pub fn get(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.snapshot().by_id.get(agent_id).cloned()
    }

    /// Routing health for every registered agent.
    pub fn health(&self) -> Vec<AgentHealth> {
        self.snapshot()
            .agents
            .iter()
            .map(|agent| AgentHealth {
                agent_id: agent.agent_id().to_string(),
                agent_type: agent.agent_type().to_string(),
                status: agent.status(),
                risk_score: agent.risk_score(),
                block_rate: agent.block_rate(),
            })
            .collect()
    }

    /// Capability to agent-id map (for status surfaces).
    pub fn capabilities(&self) -> HashMap<String, Vec<String>> {
        self.snapshot()
            .by_capability
            .iter()
            .map(|(cap, ids)| (cap.as_str().to_string(), ids.clone()))
            .collect()
    }

    /// Registered agent count.
    pub fn agent_count(&self) -> usize {
        self.snapshot().agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{FinanceAgent, ItAgent};
    use citadel_compliance::ComplianceEngine;
    use citadel_tirs::{Tirs, TirsConfig};

    fn router_with_agents() -> (CapabilityRouter, Arc<Tirs>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let tirs = Arc::new(
            Tirs::new(TirsConfig {
                storage_dir: dir.path().to_path_buf(),
                ..TirsConfig::default()
            })
            .unwrap(),
        );
        let compliance = Arc::new(ComplianceEngine::with_default_policies());

        let router = CapabilityRouter::new();
        router
            .register(Arc::new(Agent::new(
                Box::new(FinanceAgent::new()),
                Arc::clone(&tirs),
                Arc::clone(&compliance),
            )))
            .unwrap();
        router
            .register(Arc::new(Agent::new(
                Box::new(ItAgent::new()),
                Arc::clone(&tirs),
                Arc::clone(&compliance),
            )))
            .unwrap();

        (router, tirs, dir)
    }

    #[test]
    fn test_routes_to_capability_owner() {
        let (router, _tirs, _dir) = router_with_agents();
        let decision = router.route("approve_expense");
        assert_eq!(decision.capability, Some(Capability::ApproveExpense));
        assert_eq!(decision.agent.unwrap().agent_id(), "finance_agent");
    }

    #[test]
    fn test_unknown_action_has_no_route() {
        let (router, _tirs, _dir) = router_with_agents();
        let decision = router.route("summon_dragon");
        assert!(decision.agent.is_none());
        assert!(decision.capability.is_none());
    }

    #[test]
    fn test_killed_agent_excluded() {
        let (router, tirs, _dir) = router_with_agents();
        tirs.kill("it_agent");

        let decision = router.route("provision_access");
        assert!(decision.agent.is_none());
        assert_eq!(decision.capability, Some(Capability::ProvisionAccess));
    }

    #[test]
    fn test_repeat_routing_is_stable() {
        let (router, _tirs, _dir) = router_with_agents();
        let first = router.route("approve_expense").agent.unwrap().agent_id().to_string();
        for _ in 0..5 {
            assert_eq!(
                router.route("approve_expense").agent.unwrap().agent_id(),
                first
            );
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (router, tirs, _dir) = router_with_agents();
        let compliance = Arc::new(ComplianceEngine::with_default_policies());
        let duplicate = Arc::new(Agent::new(
            Box::new(FinanceAgent::new()),
            tirs,
            compliance,
        ));
        assert!(matches!(
            router.register(duplicate),
            Err(OrchestratorError::DuplicateAgent { .. })
        ));
    }

    #[test]
    fn test_find_by_type() {
        let (router, _tirs, _dir) = router_with_agents();
        assert_eq!(router.find_by_type("it").unwrap().agent_id(), "it_agent");
        assert!(router.find_by_type("hr").is_none());
    }
}
