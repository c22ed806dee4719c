//! Read path over pods, nodes and namespaces.
//!
//! Reads go through `ClusterReader`. Before the background sync has listed every kind once,
//! `ClusterStateCache` answers with direct API queries; afterwards it answers from the
//! in-memory snapshot that the sync tasks keep current.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::Client;
use tokio::sync::watch;

use crate::errors::Error;

pub mod direct;
pub mod snapshot;
pub mod sync;

pub use direct::DirectReader;
pub use snapshot::{SnapshotReader, SnapshotWriter};
pub use sync::SyncHandle;

/// Equality-based label selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector(BTreeMap<String, String>);

impl LabelSelector {
    pub fn new() -> Self {
        LabelSelector::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_owned(), value.to_owned());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.0
            .iter()
            .all(|(key, value)| labels.and_then(|labels| labels.get(key)) == Some(value))
    }
}

impl From<&BTreeMap<String, String>> for LabelSelector {
    fn from(labels: &BTreeMap<String, String>) -> Self {
        LabelSelector(labels.clone())
    }
}

/// Renders the `labelSelector` query parameter form, `k1=v1,k2=v2`
impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", pairs.join(","))
    }
}

/// Point queries against cluster state. Results are owned copies.
#[async_trait]
pub trait ClusterReader: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>, Error>;

    async fn get_node(&self, name: &str) -> Result<Option<Node>, Error>;

    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, Error>;
}

/// One-shot flag set once the initial sync of every kind has completed
#[derive(Debug, Clone, Default)]
pub struct ReadinessGate(Arc<RwLock<bool>>);

impl ReadinessGate {
    pub fn new() -> Self {
        ReadinessGate::default()
    }

    pub fn is_ready(&self) -> bool {
        match self.0.read() {
            Ok(ready) => *ready,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn mark_ready(&self) {
        let mut ready = match self.0.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *ready = true;
    }
}

/// Dual-mode reader: direct queries until the gate opens, snapshot reads afterwards
#[derive(Clone)]
pub struct ClusterStateCache {
    direct: Arc<dyn ClusterReader>,
    snapshot: Arc<dyn ClusterReader>,
    gate: ReadinessGate,
}

impl ClusterStateCache {
    pub fn new(direct: Arc<dyn ClusterReader>, snapshot: Arc<dyn ClusterReader>, gate: ReadinessGate) -> Self {
        ClusterStateCache { direct, snapshot, gate }
    }

    pub fn is_synced(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn gate(&self) -> ReadinessGate {
        self.gate.clone()
    }

    fn active(&self) -> &dyn ClusterReader {
        if self.gate.is_ready() {
            self.snapshot.as_ref()
        } else {
            self.direct.as_ref()
        }
    }
}

#[async_trait]
impl ClusterReader for ClusterStateCache {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        self.active().get_namespace(name).await
    }

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>, Error> {
        self.active().list_pods(namespace, selector).await
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, Error> {
        self.active().get_node(name).await
    }

    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, Error> {
        self.active().list_nodes(selector).await
    }
}

/// Wire up the cache and spawn the watch tasks that feed its snapshot.
/// The returned handle resolves once the initial sync is done.
pub fn start(client: Client, shutdown: watch::Receiver<bool>) -> (ClusterStateCache, SyncHandle) {
    let (reader, writer) = snapshot::snapshot();
    let gate = ReadinessGate::new();
    let handle = sync::spawn(client.clone(), writer, gate.clone(), shutdown);

    let cache = ClusterStateCache::new(Arc::new(DirectReader::new(client)), Arc::new(reader), gate);
    (cache, handle)
}
