//! Create-index coordination on the elected master.
//!
//! `create_index` enqueues one task on the cluster-state queue. That task
//! validates the request, assembles mappings, materializes the index
//! locally, and commits the new metadata. Shard routing is committed by a
//! second task only after every peer has reported the index (or the
//! acknowledgment window has closed), so the allocator never races peers
//! that have not yet materialized the index.

use crate::ack::CreationAckTracker;
use crate::cluster::{ClusterService, StateUpdateError, StateUpdateTask};
use crate::environment::Environment;
use crate::indices::{IndexStoreError, LocalIndexStore, MapperError};
use crate::mappings::load_index_mappings;
use crate::metadata::{IndexMetaData, MetaData};
use crate::notify::NodeIndexCreatedHub;
use crate::routing::{IndexRoutingTable, RoutingStrategy, RoutingTable};
use crate::settings::{
    Settings, SettingsError, DEFAULT_NUMBER_OF_REPLICAS, DEFAULT_NUMBER_OF_SHARDS,
    SETTING_NUMBER_OF_REPLICAS, SETTING_NUMBER_OF_SHARDS,
};
use crate::state::ClusterState;
use crate::telemetry::CreateIndexMetrics;
use crate::timer::{TimeoutHandle, TimerService};
use crate::validate::{validate_index_name, InvalidIndexNameReason};
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How long a create waits for peer acknowledgments by default.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct CreateIndexRequest {
    pub(crate) cause: String,
    pub(crate) index: String,
    pub(crate) settings: Settings,
    pub(crate) mappings: BTreeMap<String, String>,
    pub(crate) timeout: Duration,
}

impl CreateIndexRequest {
    pub fn new(cause: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
            index: index.into(),
            settings: Settings::default(),
            mappings: BTreeMap::new(),
            timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn mapping(mut self, mapping_type: impl Into<String>, source: impl Into<String>) -> Self {
        self.mappings.insert(mapping_type.into(), source.into());
        self
    }

    pub fn mappings(mut self, mappings: BTreeMap<String, String>) -> Self {
        self.mappings.extend(mappings);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }
}

/// `acknowledged` is true iff every non-master peer reported creation
/// before the deadline. The index exists and is routed either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndexResponse {
    pub acknowledged: bool,
}

#[derive(Debug, Error)]
pub enum CreateIndexError {
    #[error("index [{0}] already exists")]
    IndexAlreadyExists(String),
    #[error("invalid index name [{name}], {reason}")]
    InvalidIndexName {
        name: String,
        reason: InvalidIndexNameReason,
    },
    #[error("failed to parse mapping [{mapping_type}]")]
    MapperParsing {
        mapping_type: String,
        #[source]
        source: MapperError,
    },
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] IndexStoreError),
}

/// Caller-supplied completion callback. Invoked exactly once per request,
/// from a queue, timer, or transport thread.
pub trait CreateIndexListener: Send + Sync {
    fn on_response(&self, response: CreateIndexResponse);
    fn on_failure(&self, error: CreateIndexError);
}

pub struct CreateIndexService {
    settings: Settings,
    environment: Environment,
    timer: Arc<TimerService>,
    cluster: Arc<ClusterService>,
    store: Arc<dyn LocalIndexStore>,
    routing_strategy: Arc<dyn RoutingStrategy>,
    created_hub: Arc<NodeIndexCreatedHub>,
    metrics: Arc<dyn CreateIndexMetrics>,
}

impl CreateIndexService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        environment: Environment,
        timer: Arc<TimerService>,
        cluster: Arc<ClusterService>,
        store: Arc<dyn LocalIndexStore>,
        routing_strategy: Arc<dyn RoutingStrategy>,
        created_hub: Arc<NodeIndexCreatedHub>,
        metrics: Arc<dyn CreateIndexMetrics>,
    ) -> Self {
        Self {
            settings,
            environment,
            timer,
            cluster,
            store,
            routing_strategy,
            created_hub,
            metrics,
        }
    }

    /// Non-blocking: enqueues the create and returns. The listener is
    /// settled asynchronously, exactly once.
    pub fn create_index(&self, request: CreateIndexRequest, listener: Arc<dyn CreateIndexListener>) {
        self.metrics.record_submitted(&request.index);
        let description = format!(
            "create-index [{}], cause [{}]",
            request.index, request.cause
        );
        let gate = Arc::new(CreateIndexGate {
            index: request.index.clone(),
            notified: AtomicBool::new(false),
            timeout: Mutex::new(None),
            listener,
            cluster: self.cluster.clone(),
            routing_strategy: self.routing_strategy.clone(),
            metrics: self.metrics.clone(),
        });
        let cluster_settings = self.settings.clone();
        let environment = self.environment.clone();
        let timer = self.timer.clone();
        let store = self.store.clone();
        let hub = self.created_hub.clone();
        self.cluster.submit(StateUpdateTask::new(description, move |current| {
            match execute_create(
                current,
                &request,
                &gate,
                &cluster_settings,
                &environment,
                &timer,
                store.as_ref(),
                &hub,
            ) {
                Ok(new_state) => Ok(new_state),
                // pre-commit failures leave no trace
                Err(err) => {
                    gate.on_failure(err);
                    Ok(current.clone())
                }
            }
        }));
    }
}

#[allow(clippy::too_many_arguments)]
fn execute_create(
    current: &ClusterState,
    request: &CreateIndexRequest,
    gate: &Arc<CreateIndexGate>,
    cluster_settings: &Settings,
    environment: &Environment,
    timer: &TimerService,
    store: &dyn LocalIndexStore,
    hub: &Arc<NodeIndexCreatedHub>,
) -> Result<ClusterState, CreateIndexError> {
    let index = request.index.as_str();
    if current.routing_table().has_index(index) {
        return Err(CreateIndexError::IndexAlreadyExists(index.to_string()));
    }
    if current.metadata().has_index(index) {
        return Err(CreateIndexError::IndexAlreadyExists(index.to_string()));
    }
    if let Err(reason) = validate_index_name(index) {
        return Err(CreateIndexError::InvalidIndexName {
            name: index.to_string(),
            reason,
        });
    }
    if current.metadata().aliases().contains(index) {
        return Err(CreateIndexError::InvalidIndexName {
            name: index.to_string(),
            reason: InvalidIndexNameReason::CollidesWithAlias,
        });
    }

    // operator-provided mapping layers, then the request's own mappings
    let mut mappings = load_index_mappings(environment, index);
    for (mapping_type, source) in &request.mappings {
        mappings.insert(mapping_type.clone(), source.clone());
    }

    let index_settings = resolve_index_settings(&request.settings, cluster_settings)?;

    // create on the master first to prove the index can exist at all
    store.create(index, &index_settings, current.nodes().local_node_id())?;
    let index_service = store.index_service_safe(index)?;
    let mapper = index_service.mapper_service();
    for (mapping_type, source) in &mappings {
        if let Err(source) = mapper.add(mapping_type, source) {
            if let Err(delete_err) = store.delete(index) {
                warn!("failed to clean up partially created index [{index}]: {delete_err}");
            }
            return Err(CreateIndexError::MapperParsing {
                mapping_type: mapping_type.clone(),
                source,
            });
        }
    }

    // the mapper may rewrite sources; commit its canonical form
    let mut metadata_builder = IndexMetaData::builder(index).settings(index_settings);
    let mut mapping_types = Vec::new();
    for (mapping_type, canonical) in mapper.mappings() {
        mapping_types.push(mapping_type.clone());
        metadata_builder = metadata_builder.put_mapping(mapping_type, canonical);
    }
    let index_metadata = metadata_builder.build();
    info!(
        "[{index}] creating index, cause [{}], shards [{}]/[{}], mappings {mapping_types:?}",
        request.cause,
        index_metadata.number_of_shards(),
        index_metadata.number_of_replicas(),
    );

    let new_metadata = MetaData::builder_from(current.metadata())
        .put(index_metadata)
        .build();

    // the master already hosts the index, so peers owe nodes - 1 acks
    let expected = current.nodes().len().saturating_sub(1);
    let ack_gate = gate.clone();
    let tracker = CreationAckTracker::register(
        hub.clone(),
        index.to_string(),
        expected,
        move |acknowledged| {
            ack_gate.on_response(CreateIndexResponse { acknowledged });
        },
    );
    if expected > 0 {
        let timer_tracker = tracker.clone();
        let handle = timer.schedule(request.timeout, move || {
            timer_tracker.settle_timeout();
        });
        gate.arm_timeout(handle);
    }

    Ok(ClusterState::builder_from(current)
        .metadata(new_metadata)
        .build())
}

fn resolve_index_settings(
    requested: &Settings,
    cluster_settings: &Settings,
) -> Result<Settings, SettingsError> {
    let mut builder = Settings::builder().put_all(requested);
    if requested.get(SETTING_NUMBER_OF_SHARDS).is_none() {
        builder = builder.put_int(
            SETTING_NUMBER_OF_SHARDS,
            cluster_settings.as_int(SETTING_NUMBER_OF_SHARDS, DEFAULT_NUMBER_OF_SHARDS as i64)?,
        );
    }
    if requested.get(SETTING_NUMBER_OF_REPLICAS).is_none() {
        builder = builder.put_int(
            SETTING_NUMBER_OF_REPLICAS,
            cluster_settings.as_int(
                SETTING_NUMBER_OF_REPLICAS,
                DEFAULT_NUMBER_OF_REPLICAS as i64,
            )?,
        );
    }
    let resolved = builder.build();
    // surface malformed counts now, before anything is materialized
    resolved.as_int(SETTING_NUMBER_OF_SHARDS, DEFAULT_NUMBER_OF_SHARDS as i64)?;
    resolved.as_int(SETTING_NUMBER_OF_REPLICAS, DEFAULT_NUMBER_OF_REPLICAS as i64)?;
    Ok(resolved)
}

/// Exactly-once settlement for one create operation. The first of
/// success, failure, or timeout wins; the success path additionally owns
/// the follow-up routing commit.
struct CreateIndexGate {
    index: String,
    notified: AtomicBool,
    timeout: Mutex<Option<TimeoutHandle>>,
    listener: Arc<dyn CreateIndexListener>,
    cluster: Arc<ClusterService>,
    routing_strategy: Arc<dyn RoutingStrategy>,
    metrics: Arc<dyn CreateIndexMetrics>,
}

impl CreateIndexGate {
    fn arm_timeout(&self, handle: TimeoutHandle) {
        *self.timeout.lock() = Some(handle);
        // settlement may have won between scheduling and arming
        if self.notified.load(Ordering::SeqCst) {
            self.cancel_timeout();
        }
    }

    fn cancel_timeout(&self) {
        if let Some(handle) = self.timeout.lock().take() {
            handle.cancel();
        }
    }

    fn on_response(&self, response: CreateIndexResponse) {
        if self
            .notified
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.cancel_timeout();
        if response.acknowledged {
            self.metrics.record_acknowledged(&self.index);
        } else {
            self.metrics.record_unacknowledged(&self.index);
        }
        // Allocate shards only now: every peer either hosts the new
        // metadata or has declined within the window, so the allocator can
        // query them for shard placement without racing creation.
        let index = self.index.clone();
        let routing_strategy = self.routing_strategy.clone();
        let listener = self.listener.clone();
        self.cluster.submit(StateUpdateTask::processed(
            format!("reroute after index [{}] creation", self.index),
            move |current| {
                let metadata = current
                    .metadata()
                    .index(&index)
                    .ok_or_else(|| StateUpdateError::MissingIndexMetaData(index.clone()))?;
                let mut builder = RoutingTable::builder();
                for table in current.routing_table().indices() {
                    builder = builder.add(table.clone());
                }
                builder = builder.add(IndexRoutingTable::initialize_empty(metadata));
                let staged = ClusterState::builder_from(current)
                    .routing_table(builder.build())
                    .build();
                let routed = routing_strategy.reroute(&staged);
                Ok(ClusterState::builder_from(current)
                    .routing_table(routed)
                    .build())
            },
            move |_state| {
                listener.on_response(response);
            },
        ));
    }

    fn on_failure(&self, error: CreateIndexError) {
        if self
            .notified
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        self.cancel_timeout();
        self.metrics.record_failure(&self.index);
        self.listener.on_failure(error);
    }
}
