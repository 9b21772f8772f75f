use std::collections::HashMap;

use async_trait::async_trait;

use crate::rule::ToolPolicy;

/// Agent key that applies to every agent without an exact entry
pub const ANY_AGENT: &str = "*";

/// Read-only lookup of tool policies keyed by agent and tool
///
/// Storage is external to this layer; deployments back this with whatever
/// holds their policy configuration.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Policy for one agent's tool, `None` when nothing is configured.
    /// An unconfigured tool is allowed.
    async fn tool_policy(&self, agent_id: &str, tool_name: &str) -> Option<ToolPolicy>;
}

/// In-memory policy store for config-driven deployments
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    policies: HashMap<(String, String), ToolPolicy>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a policy for one agent's tool. The agent `"*"` matches any
    /// agent that has no exact entry for the tool.
    pub fn insert(&mut self, agent_id: impl Into<String>, tool_name: impl Into<String>, policy: ToolPolicy) {
        self.policies.insert((agent_id.into(), tool_name.into()), policy);
    }

    /// Number of configured policies
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn tool_policy(&self, agent_id: &str, tool_name: &str) -> Option<ToolPolicy> {
        if let Some(policy) = self.policies.get(&(agent_id.to_owned(), tool_name.to_owned())) {
            return Some(policy.clone());
        }
        self.policies.get(&(ANY_AGENT.to_owned(), tool_name.to_owned())).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exact_agent_entry_beats_wildcard() {
        let mut store = MemoryPolicyStore::new();
        store.insert(
            ANY_AGENT,
            "read_file",
            ToolPolicy {
                allow_untrusted_context: false,
                argument_rules: Vec::new(),
            },
        );
        store.insert(
            "researcher",
            "read_file",
            ToolPolicy {
                allow_untrusted_context: true,
                argument_rules: Vec::new(),
            },
        );

        let exact = store.tool_policy("researcher", "read_file").await.unwrap();
        assert!(exact.allow_untrusted_context);

        let fallback = store.tool_policy("other-agent", "read_file").await.unwrap();
        assert!(!fallback.allow_untrusted_context);

        assert!(store.tool_policy("researcher", "write_file").await.is_none());
    }
}
