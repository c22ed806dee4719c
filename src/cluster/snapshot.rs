use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::runtime::watcher::Event;
use kube::ResourceExt;

use crate::cluster::{ClusterReader, LabelSelector};
use crate::errors::Error;
use crate::CAPACITY_LABEL;

type PodKey = (String, String);

#[derive(Default)]
struct Inner {
    pods: DashMap<PodKey, Pod>,
    nodes: DashMap<String, Node>,
    namespaces: DashMap<String, Namespace>,
    /// capacity label value -> names of the nodes carrying it
    capacity_index: DashMap<String, HashSet<String>>,
}

/// Create an empty snapshot, split into its read side and its single write side
pub fn snapshot() -> (SnapshotReader, SnapshotWriter) {
    let inner = Arc::new(Inner::default());
    (
        SnapshotReader { inner: inner.clone() },
        SnapshotWriter { inner },
    )
}

#[derive(Clone)]
pub struct SnapshotReader {
    inner: Arc<Inner>,
}

/// Write side of the snapshot, owned by the sync tasks
pub struct SnapshotWriter {
    inner: Arc<Inner>,
}

/// Applies one watcher event for resource `K` to the snapshot
pub trait ApplyEvent<K> {
    fn apply(&self, event: Event<K>);
}

fn pod_key(pod: &Pod) -> PodKey {
    (pod.namespace().unwrap_or_default(), pod.name_any())
}

fn capacity_of(node: &Node) -> Option<String> {
    node.labels().get(CAPACITY_LABEL).cloned()
}

impl SnapshotWriter {
    fn index_node(&self, node: &Node) {
        let name = node.name_any();
        self.unindex_node(&name);
        if let Some(class) = capacity_of(node) {
            self.inner.capacity_index.entry(class).or_default().insert(name);
        }
    }

    fn unindex_node(&self, name: &str) {
        for mut members in self.inner.capacity_index.iter_mut() {
            members.value_mut().remove(name);
        }
    }
}

impl ApplyEvent<Pod> for SnapshotWriter {
    fn apply(&self, event: Event<Pod>) {
        match event {
            Event::Applied(pod) => {
                self.inner.pods.insert(pod_key(&pod), pod);
            }
            Event::Deleted(pod) => {
                self.inner.pods.remove(&pod_key(&pod));
            }
            Event::Restarted(pods) => {
                let keys: HashSet<PodKey> = pods.iter().map(pod_key).collect();
                for pod in pods {
                    self.inner.pods.insert(pod_key(&pod), pod);
                }
                self.inner.pods.retain(|key, _| keys.contains(key));
            }
        }
    }
}

impl ApplyEvent<Node> for SnapshotWriter {
    fn apply(&self, event: Event<Node>) {
        match event {
            Event::Applied(node) => {
                self.index_node(&node);
                self.inner.nodes.insert(node.name_any(), node);
            }
            Event::Deleted(node) => {
                let name = node.name_any();
                self.unindex_node(&name);
                self.inner.nodes.remove(&name);
            }
            Event::Restarted(nodes) => {
                let names: HashSet<String> = nodes.iter().map(|node| node.name_any()).collect();
                for node in nodes {
                    self.index_node(&node);
                    self.inner.nodes.insert(node.name_any(), node);
                }
                self.inner.nodes.retain(|name, _| names.contains(name));
                for mut members in self.inner.capacity_index.iter_mut() {
                    members.value_mut().retain(|name| names.contains(name));
                }
            }
        }
    }
}

impl ApplyEvent<Namespace> for SnapshotWriter {
    fn apply(&self, event: Event<Namespace>) {
        match event {
            Event::Applied(ns) => {
                self.inner.namespaces.insert(ns.name_any(), ns);
            }
            Event::Deleted(ns) => {
                self.inner.namespaces.remove(&ns.name_any());
            }
            Event::Restarted(namespaces) => {
                let names: HashSet<String> = namespaces.iter().map(|ns| ns.name_any()).collect();
                for ns in namespaces {
                    self.inner.namespaces.insert(ns.name_any(), ns);
                }
                self.inner.namespaces.retain(|name, _| names.contains(name));
            }
        }
    }
}

impl SnapshotReader {
    /// Names of the nodes whose capacity label equals `class`
    pub fn capacity_members(&self, class: &str) -> HashSet<String> {
        self.inner
            .capacity_index
            .get(class)
            .map(|members| members.value().clone())
            .unwrap_or_default()
    }

    fn nodes_matching(&self, selector: &LabelSelector) -> Vec<Node> {
        let candidates: Vec<Node> = match selector.get(CAPACITY_LABEL) {
            Some(class) => self
                .capacity_members(class)
                .iter()
                .filter_map(|name| self.inner.nodes.get(name).map(|node| node.value().clone()))
                .collect(),
            None => self.inner.nodes.iter().map(|node| node.value().clone()).collect(),
        };
        candidates
            .into_iter()
            .filter(|node| selector.matches(node.metadata.labels.as_ref()))
            .collect()
    }
}

#[async_trait]
impl ClusterReader for SnapshotReader {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        Ok(self.inner.namespaces.get(name).map(|ns| ns.value().clone()))
    }

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>, Error> {
        Ok(self
            .inner
            .pods
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .filter(|entry| selector.matches(entry.value().metadata.labels.as_ref()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, Error> {
        Ok(self.inner.nodes.get(name).map(|node| node.value().clone()))
    }

    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, Error> {
        Ok(self.nodes_matching(selector))
    }
}
