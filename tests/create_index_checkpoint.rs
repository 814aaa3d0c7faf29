use indexplane::{
    ClusterService, ClusterState, CreateIndexError, CreateIndexListener, CreateIndexRequest,
    CreateIndexResponse, CreateIndexService, CreateOutcome, DiscoveryNode, DiscoveryNodes,
    Environment, EvenSpreadRoutingStrategy, InMemoryCreateIndexMetrics, InvalidIndexNameReason,
    MemoryIndexStore, MetaData, NodeIndexCreatedHub, Settings, ShardRoutingState, TimerService,
    SETTING_NUMBER_OF_SHARDS,
};
use parking_lot::Mutex;
use std::fs;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

type Outcome = Result<CreateIndexResponse, CreateIndexError>;

struct ChannelListener {
    tx: Mutex<mpsc::Sender<Outcome>>,
}

impl CreateIndexListener for ChannelListener {
    fn on_response(&self, response: CreateIndexResponse) {
        let _ = self.tx.lock().send(Ok(response));
    }

    fn on_failure(&self, error: CreateIndexError) {
        let _ = self.tx.lock().send(Err(error));
    }
}

fn channel_listener() -> (Arc<ChannelListener>, mpsc::Receiver<Outcome>) {
    let (tx, rx) = mpsc::channel();
    (Arc::new(ChannelListener { tx: Mutex::new(tx) }), rx)
}

struct Harness {
    _tmp: TempDir,
    environment: Environment,
    // kept alive so armed deadlines can still fire
    _timer: Arc<TimerService>,
    cluster: Arc<ClusterService>,
    store: Arc<MemoryIndexStore>,
    hub: Arc<NodeIndexCreatedHub>,
    metrics: InMemoryCreateIndexMetrics,
    service: CreateIndexService,
}

fn harness(node_count: usize) -> Harness {
    harness_with(node_count, MetaData::default())
}

fn harness_with(node_count: usize, metadata: MetaData) -> Harness {
    let tmp = TempDir::new().unwrap();
    let environment = Environment::new(tmp.path());
    let mut nodes = DiscoveryNodes::builder().local_node_id("node-1");
    for ordinal in 1..=node_count {
        nodes = nodes.put(DiscoveryNode::new(
            format!("node-{ordinal}"),
            format!("node-{ordinal}"),
        ));
    }
    let initial = ClusterState::builder()
        .metadata(metadata)
        .nodes(nodes.build())
        .build();
    let cluster = Arc::new(ClusterService::new(initial));
    let timer = Arc::new(TimerService::new());
    let store = Arc::new(MemoryIndexStore::new());
    let hub = Arc::new(NodeIndexCreatedHub::new());
    let metrics = InMemoryCreateIndexMetrics::default();
    let service = CreateIndexService::new(
        Settings::default(),
        environment.clone(),
        timer.clone(),
        cluster.clone(),
        store.clone(),
        Arc::new(EvenSpreadRoutingStrategy),
        hub.clone(),
        Arc::new(metrics.clone()),
    );
    Harness {
        _tmp: tmp,
        environment,
        _timer: timer,
        cluster,
        store,
        hub,
        metrics,
        service,
    }
}

fn await_metadata(cluster: &ClusterService, index: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cluster.state().metadata().has_index(index) {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("metadata for [{index}] never appeared");
}

fn recv(rx: &mpsc::Receiver<Outcome>) -> Outcome {
    rx.recv_timeout(Duration::from_secs(10))
        .expect("create never settled")
}

#[test]
fn three_node_create_acknowledges_once_both_peers_report() {
    let h = harness(3);
    let (listener, rx) = channel_listener();
    h.service.create_index(
        CreateIndexRequest::new("test", "logs-2024")
            .settings(
                Settings::builder()
                    .put(SETTING_NUMBER_OF_SHARDS, "3")
                    .build(),
            )
            .timeout(Duration::from_secs(5)),
        listener,
    );
    await_metadata(&h.cluster, "logs-2024");
    h.hub.node_index_created("logs-2024", "node-2");
    h.hub.node_index_created("logs-2024", "node-3");

    let response = recv(&rx).expect("create failed");
    assert!(response.acknowledged);

    let state = h.cluster.state();
    let metadata = state.metadata().index("logs-2024").unwrap();
    assert_eq!(metadata.number_of_shards(), 3);
    assert_eq!(metadata.number_of_replicas(), 1);

    let routing = state.routing_table().index("logs-2024").unwrap();
    assert_eq!(routing.shard_count(), 3);
    let primaries: Vec<_> = routing.copies().filter(|copy| copy.primary()).collect();
    assert_eq!(primaries.len(), 3);
    assert!(primaries
        .iter()
        .all(|copy| copy.state() == ShardRoutingState::Initializing));

    // settled trackers leave nothing registered behind them
    assert!(h.hub.is_empty());
    let metrics = h.metrics.snapshot();
    assert_eq!(metrics.submitted, 1);
    assert_eq!(metrics.acknowledged, 1);
    assert_eq!(
        metrics.outcomes.get("logs-2024"),
        Some(&CreateOutcome::Acknowledged)
    );
}

#[test]
fn alias_collision_fails_and_leaves_state_value_equal() {
    let h = harness_with(1, MetaData::builder().add_alias("events").build());
    let before = h.cluster.state();
    let (listener, rx) = channel_listener();
    h.service
        .create_index(CreateIndexRequest::new("api", "events"), listener);
    let err = recv(&rx).expect_err("alias collision must fail");
    assert!(matches!(
        err,
        CreateIndexError::InvalidIndexName {
            reason: InvalidIndexNameReason::CollidesWithAlias,
            ..
        }
    ));
    assert_eq!(h.cluster.state(), before);
    assert!(!h.store.exists("events"));
}

#[test]
fn uppercase_names_are_rejected() {
    let h = harness(1);
    let (listener, rx) = channel_listener();
    h.service
        .create_index(CreateIndexRequest::new("api", "LOGS"), listener);
    let err = recv(&rx).expect_err("uppercase name must fail");
    assert!(matches!(
        err,
        CreateIndexError::InvalidIndexName {
            reason: InvalidIndexNameReason::MustBeLowercase,
            ..
        }
    ));
}

#[test]
fn request_mappings_override_default_and_index_layers() {
    let h = harness(1);
    let root = h.environment.mappings_dir();
    fs::create_dir_all(root.join("_default")).unwrap();
    fs::create_dir_all(root.join("logs")).unwrap();
    fs::write(root.join("_default/doc.json"), r#"{"layer": "default"}"#).unwrap();
    fs::write(root.join("_default/event.json"), r#"{"layer": "default"}"#).unwrap();
    fs::write(root.join("logs/doc.json"), r#"{"layer": "index"}"#).unwrap();

    let (listener, rx) = channel_listener();
    h.service.create_index(
        CreateIndexRequest::new("api", "logs").mapping("doc", r#"{"layer": "request"}"#),
        listener,
    );
    recv(&rx).expect("create failed");

    let state = h.cluster.state();
    let metadata = state.metadata().index("logs").unwrap();
    // the request's source wins, committed in the mapper's canonical form
    assert_eq!(metadata.mapping("doc"), Some(r#"{"layer":"request"}"#));
    assert_eq!(metadata.mapping("event"), Some(r#"{"layer":"default"}"#));
}

#[test]
fn mapping_parse_failure_rolls_back_the_local_index() {
    let h = harness(1);
    let before = h.cluster.state();
    let (listener, rx) = channel_listener();
    h.service.create_index(
        CreateIndexRequest::new("api", "logs-2024").mapping("bad", "!!!"),
        listener,
    );
    let err = recv(&rx).expect_err("unparsable mapping must fail");
    assert!(
        matches!(err, CreateIndexError::MapperParsing { ref mapping_type, .. } if mapping_type == "bad")
    );
    assert!(!h.store.exists("logs-2024"));
    assert_eq!(h.cluster.state(), before);
}

#[test]
fn unresolvable_shard_count_fails_before_materialization() {
    let h = harness(1);
    let (listener, rx) = channel_listener();
    h.service.create_index(
        CreateIndexRequest::new("api", "logs").settings(
            Settings::builder()
                .put(SETTING_NUMBER_OF_SHARDS, "lots")
                .build(),
        ),
        listener,
    );
    let err = recv(&rx).expect_err("malformed shard count must fail");
    assert!(matches!(err, CreateIndexError::Settings(_)));
    assert!(!h.store.exists("logs"));
}

#[test]
fn validation_failures_report_the_same_reason_every_time() {
    for _ in 0..2 {
        let h = harness(1);
        let (listener, rx) = channel_listener();
        h.service
            .create_index(CreateIndexRequest::new("api", "bad name,#"), listener);
        let err = recv(&rx).expect_err("invalid name must fail");
        assert!(matches!(
            err,
            CreateIndexError::InvalidIndexName {
                reason: InvalidIndexNameReason::WhitespaceForbidden,
                ..
            }
        ));
    }
}
