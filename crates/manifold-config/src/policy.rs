use indexmap::IndexMap;
use manifold_policy::{MemoryPolicyStore, ToolPolicy};
use serde::Deserialize;

/// Tool-invocation policy configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Per-agent tool policies; the agent key `"*"` applies to every
    /// agent without an exact entry
    #[serde(default)]
    pub agents: IndexMap<String, AgentPolicyConfig>,
}

/// Tool policies for one agent
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentPolicyConfig {
    /// Policies keyed by tool name
    #[serde(default)]
    pub tools: IndexMap<String, ToolPolicy>,
}

impl PolicyConfig {
    /// True when no policy is configured for any agent
    pub fn is_empty(&self) -> bool {
        self.agents.values().all(|agent| agent.tools.is_empty())
    }

    /// Build the in-memory store the evaluator consults
    pub fn build_store(&self) -> MemoryPolicyStore {
        let mut store = MemoryPolicyStore::new();
        for (agent_id, agent) in &self.agents {
            for (tool_name, policy) in &agent.tools {
                store.insert(agent_id.clone(), tool_name.clone(), policy.clone());
            }
        }
        store
    }
}
