//! Core library entrypoint for the indexplane control plane:
//! coordinated index creation on the elected master of a distributed
//! search cluster.
#![deny(unreachable_pub)]
#![deny(unused_must_use)]

pub mod ack;
pub mod cluster;
pub mod create;
pub mod environment;
pub mod health;
pub mod indices;
pub mod mappings;
pub mod metadata;
pub mod nodes;
pub mod notify;
pub mod routing;
pub mod settings;
pub mod state;
pub mod telemetry;
pub mod timer;
pub mod validate;

pub use ack::CreationAckTracker;
pub use cluster::{ClusterService, ClusterStateListener, StateUpdateError, StateUpdateTask};
pub use create::{
    CreateIndexError, CreateIndexListener, CreateIndexRequest, CreateIndexResponse,
    CreateIndexService, DEFAULT_ACK_TIMEOUT,
};
pub use environment::{Environment, EnvironmentError};
pub use health::{ClusterHealth, ClusterHealthStatus, ClusterIndexHealth, ClusterShardHealth};
pub use indices::{
    FsIndexStore, IndexService, IndexStoreError, JsonMapperService, LocalIndexStore, MapperError,
    MapperService, MemoryIndexStore,
};
pub use mappings::load_index_mappings;
pub use metadata::{IndexMetaData, IndexMetaDataBuilder, MetaData, MetaDataBuilder};
pub use nodes::{DiscoveryNode, DiscoveryNodes, DiscoveryNodesBuilder};
pub use notify::{NodeIndexCreatedHub, NodeIndexCreatedListener};
pub use routing::{
    EvenSpreadRoutingStrategy, IndexRoutingTable, RoutingStrategy, RoutingTable,
    RoutingTableBuilder, ShardRouting, ShardRoutingState,
};
pub use settings::{
    Settings, SettingsBuilder, SettingsError, DEFAULT_NUMBER_OF_REPLICAS,
    DEFAULT_NUMBER_OF_SHARDS, SETTING_NUMBER_OF_REPLICAS, SETTING_NUMBER_OF_SHARDS,
};
pub use state::{ClusterState, ClusterStateBuilder};
pub use telemetry::{
    CreateIndexMetrics, CreateIndexMetricsSnapshot, CreateOutcome, InMemoryCreateIndexMetrics,
    LoggingCreateIndexMetrics,
};
pub use timer::{TimeoutHandle, TimerService};
pub use validate::{validate_index_name, InvalidIndexNameReason, INVALID_FILENAME_CHARS};
