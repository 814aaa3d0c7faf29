//! Live cluster membership as seen by the elected master.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNode {
    id: String,
    name: String,
}

impl DiscoveryNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The set of live nodes, with one distinguished as local.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNodes {
    nodes: BTreeMap<String, DiscoveryNode>,
    local_node_id: String,
}

impl DiscoveryNodes {
    pub fn builder() -> DiscoveryNodesBuilder {
        DiscoveryNodesBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn get(&self, node_id: &str) -> Option<&DiscoveryNode> {
        self.nodes.get(node_id)
    }

    pub fn local_node_id(&self) -> &str {
        &self.local_node_id
    }

    pub fn local_node(&self) -> Option<&DiscoveryNode> {
        self.nodes.get(&self.local_node_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiscoveryNode> {
        self.nodes.values()
    }

    /// Node ids in deterministic (sorted) order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryNodesBuilder {
    nodes: BTreeMap<String, DiscoveryNode>,
    local_node_id: Option<String>,
}

impl DiscoveryNodesBuilder {
    pub fn put(mut self, node: DiscoveryNode) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn local_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.local_node_id = Some(node_id.into());
        self
    }

    pub fn build(self) -> DiscoveryNodes {
        DiscoveryNodes {
            local_node_id: self.local_node_id.unwrap_or_default(),
            nodes: self.nodes,
        }
    }
}
