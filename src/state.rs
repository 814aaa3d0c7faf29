//! The authoritative, versioned cluster-state snapshot.

use crate::metadata::MetaData;
use crate::nodes::DiscoveryNodes;
use crate::routing::RoutingTable;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of everything the master knows: indices and aliases
/// (`MetaData`), shard placements (`RoutingTable`), and live membership
/// (`DiscoveryNodes`). Versions increase by one per committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterState {
    version: u64,
    metadata: MetaData,
    routing_table: RoutingTable,
    nodes: DiscoveryNodes,
}

impl ClusterState {
    pub fn builder() -> ClusterStateBuilder {
        ClusterStateBuilder {
            version: 0,
            metadata: MetaData::default(),
            routing_table: RoutingTable::default(),
            nodes: DiscoveryNodes::builder().build(),
        }
    }

    /// Starts a builder seeded from `existing`; the built snapshot gets
    /// `existing.version() + 1`.
    pub fn builder_from(existing: &ClusterState) -> ClusterStateBuilder {
        ClusterStateBuilder {
            version: existing.version,
            metadata: existing.metadata.clone(),
            routing_table: existing.routing_table.clone(),
            nodes: existing.nodes.clone(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn nodes(&self) -> &DiscoveryNodes {
        &self.nodes
    }
}

#[derive(Debug, Clone)]
pub struct ClusterStateBuilder {
    version: u64,
    metadata: MetaData,
    routing_table: RoutingTable,
    nodes: DiscoveryNodes,
}

impl ClusterStateBuilder {
    pub fn metadata(mut self, metadata: MetaData) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn routing_table(mut self, routing_table: RoutingTable) -> Self {
        self.routing_table = routing_table;
        self
    }

    pub fn nodes(mut self, nodes: DiscoveryNodes) -> Self {
        self.nodes = nodes;
        self
    }

    pub fn build(self) -> ClusterState {
        ClusterState {
            version: self.version + 1,
            metadata: self.metadata,
            routing_table: self.routing_table,
            nodes: self.nodes,
        }
    }
}
