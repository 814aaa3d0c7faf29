//! Shard placement: which copy of which shard lives on which node.

use crate::metadata::IndexMetaData;
use crate::state::ClusterState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardRoutingState {
    Unassigned,
    Initializing,
    Started,
    Relocating,
}

impl ShardRoutingState {
    pub fn is_active(self) -> bool {
        matches!(self, ShardRoutingState::Started | ShardRoutingState::Relocating)
    }
}

/// One copy (primary or replica) of one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRouting {
    index: String,
    shard: u32,
    primary: bool,
    current_node: Option<String>,
    state: ShardRoutingState,
}

impl ShardRouting {
    pub fn unassigned(index: impl Into<String>, shard: u32, primary: bool) -> Self {
        Self {
            index: index.into(),
            shard,
            primary,
            current_node: None,
            state: ShardRoutingState::Unassigned,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn shard(&self) -> u32 {
        self.shard
    }

    pub fn primary(&self) -> bool {
        self.primary
    }

    pub fn current_node(&self) -> Option<&str> {
        self.current_node.as_deref()
    }

    pub fn state(&self) -> ShardRoutingState {
        self.state
    }

    pub fn active(&self) -> bool {
        self.state.is_active()
    }

    pub fn unassigned_copy(&self) -> bool {
        self.state == ShardRoutingState::Unassigned
    }

    /// Places this copy on `node` and moves it to `Initializing`.
    pub fn initialize(&self, node: impl Into<String>) -> Self {
        Self {
            current_node: Some(node.into()),
            state: ShardRoutingState::Initializing,
            ..self.clone()
        }
    }

    /// Marks an initializing copy as started on its current node.
    pub fn start(&self) -> Self {
        Self {
            state: ShardRoutingState::Started,
            ..self.clone()
        }
    }
}

/// All shard copies of a single index, grouped by shard id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRoutingTable {
    index: String,
    shards: BTreeMap<u32, Vec<ShardRouting>>,
}

impl IndexRoutingTable {
    /// Builds the unallocated routing for a freshly committed index: one
    /// primary plus the configured replicas per shard, all unassigned.
    pub fn initialize_empty(metadata: &IndexMetaData) -> Self {
        let mut shards = BTreeMap::new();
        for shard in 0..metadata.number_of_shards() {
            let mut copies = Vec::with_capacity(1 + metadata.number_of_replicas() as usize);
            copies.push(ShardRouting::unassigned(metadata.name(), shard, true));
            for _ in 0..metadata.number_of_replicas() {
                copies.push(ShardRouting::unassigned(metadata.name(), shard, false));
            }
            shards.insert(shard, copies);
        }
        Self {
            index: metadata.name().to_string(),
            shards,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard(&self, shard: u32) -> Option<&[ShardRouting]> {
        self.shards.get(&shard).map(Vec::as_slice)
    }

    pub fn groups(&self) -> impl Iterator<Item = (u32, &[ShardRouting])> {
        self.shards.iter().map(|(id, copies)| (*id, copies.as_slice()))
    }

    pub fn copies(&self) -> impl Iterator<Item = &ShardRouting> {
        self.shards.values().flatten()
    }

    /// Returns a copy of this table with every shard copy transformed.
    pub fn map_copies(&self, mut f: impl FnMut(&ShardRouting) -> ShardRouting) -> Self {
        let shards = self
            .shards
            .iter()
            .map(|(id, copies)| (*id, copies.iter().map(&mut f).collect()))
            .collect();
        Self {
            index: self.index.clone(),
            shards,
        }
    }
}

/// Per-index shard placements for the whole cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    indices: BTreeMap<String, IndexRoutingTable>,
}

impl RoutingTable {
    pub fn builder() -> RoutingTableBuilder {
        RoutingTableBuilder::default()
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indices.contains_key(index)
    }

    pub fn index(&self, index: &str) -> Option<&IndexRoutingTable> {
        self.indices.get(index)
    }

    pub fn indices(&self) -> impl Iterator<Item = &IndexRoutingTable> {
        self.indices.values()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTableBuilder {
    indices: BTreeMap<String, IndexRoutingTable>,
}

impl RoutingTableBuilder {
    pub fn add(mut self, table: IndexRoutingTable) -> Self {
        self.indices.insert(table.index.clone(), table);
        self
    }

    pub fn build(self) -> RoutingTable {
        RoutingTable {
            indices: self.indices,
        }
    }
}

/// Computes shard placements for a cluster state. Pure: must not mutate
/// its input and must be idempotent against committed metadata.
pub trait RoutingStrategy: Send + Sync {
    fn reroute(&self, state: &ClusterState) -> RoutingTable;
}

/// Places unassigned copies round-robin across live nodes and moves them
/// to `Initializing`. Already placed copies are left untouched.
#[derive(Debug, Default)]
pub struct EvenSpreadRoutingStrategy;

impl RoutingStrategy for EvenSpreadRoutingStrategy {
    fn reroute(&self, state: &ClusterState) -> RoutingTable {
        let node_ids: Vec<&str> = state.nodes().node_ids().collect();
        let mut builder = RoutingTable::builder();
        let mut cursor = 0usize;
        for table in state.routing_table().indices() {
            if node_ids.is_empty() {
                builder = builder.add(table.clone());
                continue;
            }
            let placed = table.map_copies(|copy| {
                if copy.unassigned_copy() {
                    let node = node_ids[cursor % node_ids.len()];
                    cursor += 1;
                    copy.initialize(node)
                } else {
                    copy.clone()
                }
            });
            builder = builder.add(placed);
        }
        builder.build()
    }
}
