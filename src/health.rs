//! Cluster health derived from a state snapshot.

use crate::routing::ShardRoutingState;
use crate::state::ClusterState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClusterHealthStatus {
    Green,
    Yellow,
    Red,
}

impl ClusterHealthStatus {
    fn worst(self, other: ClusterHealthStatus) -> ClusterHealthStatus {
        self.max(other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterShardHealth {
    pub shard_id: u32,
    pub status: ClusterHealthStatus,
    pub active_shards: u32,
    pub relocating_shards: u32,
    pub initializing_shards: u32,
    pub unassigned_shards: u32,
    pub primary_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIndexHealth {
    pub index: String,
    pub status: ClusterHealthStatus,
    pub number_of_shards: u32,
    pub active_shards: u32,
    pub relocating_shards: u32,
    pub initializing_shards: u32,
    pub unassigned_shards: u32,
    pub shards: BTreeMap<u32, ClusterShardHealth>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub status: ClusterHealthStatus,
    pub number_of_nodes: usize,
    pub active_shards: u32,
    pub relocating_shards: u32,
    pub initializing_shards: u32,
    pub unassigned_shards: u32,
    pub indices: BTreeMap<String, ClusterIndexHealth>,
}

impl ClusterHealth {
    /// A shard group is red while its primary is inactive, yellow while
    /// the primary is active but some copy is not, and green otherwise.
    /// Indices and the cluster report the worst status below them.
    pub fn from_state(state: &ClusterState) -> Self {
        let mut indices = BTreeMap::new();
        let mut cluster = ClusterHealth {
            status: ClusterHealthStatus::Green,
            number_of_nodes: state.nodes().len(),
            active_shards: 0,
            relocating_shards: 0,
            initializing_shards: 0,
            unassigned_shards: 0,
            indices: BTreeMap::new(),
        };
        for table in state.routing_table().indices() {
            let mut index_health = ClusterIndexHealth {
                index: table.index().to_string(),
                status: ClusterHealthStatus::Green,
                number_of_shards: table.shard_count() as u32,
                active_shards: 0,
                relocating_shards: 0,
                initializing_shards: 0,
                unassigned_shards: 0,
                shards: BTreeMap::new(),
            };
            for (shard_id, copies) in table.groups() {
                let mut shard_health = ClusterShardHealth {
                    shard_id,
                    status: ClusterHealthStatus::Red,
                    active_shards: 0,
                    relocating_shards: 0,
                    initializing_shards: 0,
                    unassigned_shards: 0,
                    primary_active: false,
                };
                for copy in copies {
                    match copy.state() {
                        ShardRoutingState::Started | ShardRoutingState::Relocating => {
                            shard_health.active_shards += 1;
                            if copy.state() == ShardRoutingState::Relocating {
                                shard_health.relocating_shards += 1;
                            }
                            if copy.primary() {
                                shard_health.primary_active = true;
                            }
                        }
                        ShardRoutingState::Initializing => shard_health.initializing_shards += 1,
                        ShardRoutingState::Unassigned => shard_health.unassigned_shards += 1,
                    }
                }
                shard_health.status = if !shard_health.primary_active {
                    ClusterHealthStatus::Red
                } else if shard_health.active_shards as usize == copies.len() {
                    ClusterHealthStatus::Green
                } else {
                    ClusterHealthStatus::Yellow
                };
                index_health.status = index_health.status.worst(shard_health.status);
                index_health.active_shards += shard_health.active_shards;
                index_health.relocating_shards += shard_health.relocating_shards;
                index_health.initializing_shards += shard_health.initializing_shards;
                index_health.unassigned_shards += shard_health.unassigned_shards;
                index_health.shards.insert(shard_id, shard_health);
            }
            cluster.status = cluster.status.worst(index_health.status);
            cluster.active_shards += index_health.active_shards;
            cluster.relocating_shards += index_health.relocating_shards;
            cluster.initializing_shards += index_health.initializing_shards;
            cluster.unassigned_shards += index_health.unassigned_shards;
            indices.insert(index_health.index.clone(), index_health);
        }
        cluster.indices = indices;
        cluster
    }
}
