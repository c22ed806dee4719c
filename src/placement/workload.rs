use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Affinity, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::cluster;
use crate::placement::capacity::pod_ready;

pub const TEMPLATE_POD_SPEC_PATH: &str = "/spec/template/spec";
pub const POD_SPEC_PATH: &str = "/spec";

/// Labels controllers stamp on single pods or single revisions. Owner selectors never
/// carry them, so they are dropped before counting a pod's siblings.
pub const POD_IDENTITY_LABELS: [&str; 4] = [
    "statefulset.kubernetes.io/pod-name",
    "apps.kubernetes.io/pod-index",
    "controller-revision-hash",
    "pod-template-hash",
];

/// Labels shared by every replica of the pod's owner
pub fn replica_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter(|(key, _)| !POD_IDENTITY_LABELS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    Pod,
}

impl WorkloadKind {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "Deployment" => Some(WorkloadKind::Deployment),
            "StatefulSet" => Some(WorkloadKind::StatefulSet),
            "Pod" => Some(WorkloadKind::Pod),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::Pod => "Pod",
        }
    }

    pub fn is_template(&self) -> bool {
        !matches!(self, WorkloadKind::Pod)
    }

    /// JSON pointer to the pod spec the placement constraints live in
    pub fn pod_spec_path(&self) -> &'static str {
        if self.is_template() {
            TEMPLATE_POD_SPEC_PATH
        } else {
            POD_SPEC_PATH
        }
    }
}

/// Uniform projection of a Deployment, StatefulSet or Pod, as far as placement cares
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadView {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    /// Selects the replicas this workload manages. For pods it is derived from the
    /// pod's labels minus `POD_IDENTITY_LABELS`.
    pub selector: Option<LabelSelector>,
    pub node_selector: Option<BTreeMap<String, String>>,
    pub affinity: Option<Affinity>,
    /// Node the pod is bound to, pods only
    pub node_name: Option<String>,
    pub ready: bool,
}

impl WorkloadView {
    fn new(kind: WorkloadKind, metadata: ObjectMeta, fallback_namespace: &str) -> Self {
        WorkloadView {
            kind,
            name: metadata.name.or(metadata.generate_name).unwrap_or_default(),
            namespace: metadata
                .namespace
                .unwrap_or_else(|| fallback_namespace.to_owned()),
            labels: metadata.labels.unwrap_or_default(),
            selector: None,
            node_selector: None,
            affinity: None,
            node_name: None,
            ready: false,
        }
    }

    fn with_pod_spec(mut self, spec: Option<PodSpec>) -> Self {
        if let Some(spec) = spec {
            self.node_selector = spec.node_selector;
            self.affinity = spec.affinity;
            self.node_name = spec.node_name;
        }
        self
    }

    pub fn from_deployment(deploy: Deployment, fallback_namespace: &str) -> Self {
        let view = WorkloadView::new(WorkloadKind::Deployment, deploy.metadata, fallback_namespace);
        match deploy.spec {
            Some(spec) => WorkloadView {
                selector: Some(spec.selector),
                ..view.with_pod_spec(spec.template.spec)
            },
            None => view,
        }
    }

    pub fn from_stateful_set(sts: StatefulSet, fallback_namespace: &str) -> Self {
        let view = WorkloadView::new(WorkloadKind::StatefulSet, sts.metadata, fallback_namespace);
        match sts.spec {
            Some(spec) => WorkloadView {
                selector: Some(spec.selector),
                ..view.with_pod_spec(spec.template.spec)
            },
            None => view,
        }
    }

    /// Equality selector over the replica set's `matchLabels`, empty when there is none
    pub fn replica_selector(&self) -> cluster::LabelSelector {
        self.selector
            .as_ref()
            .and_then(|selector| selector.match_labels.as_ref())
            .map(cluster::LabelSelector::from)
            .unwrap_or_default()
    }

    pub fn from_pod(pod: Pod, fallback_namespace: &str) -> Self {
        let ready = pod_ready(&pod);
        let view = WorkloadView::new(WorkloadKind::Pod, pod.metadata, fallback_namespace);
        let selector = LabelSelector {
            match_labels: Some(replica_labels(&view.labels)),
            ..LabelSelector::default()
        };
        WorkloadView {
            selector: Some(selector),
            ready,
            ..view.with_pod_spec(pod.spec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replica_labels_drop_pod_identity() {
        let labels: BTreeMap<String, String> = [
            ("app", "db"),
            ("statefulset.kubernetes.io/pod-name", "db-0"),
            ("apps.kubernetes.io/pod-index", "0"),
            ("controller-revision-hash", "db-5d8f"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let replica = replica_labels(&labels);
        assert_eq!(replica.len(), 1);
        assert_eq!(replica.get("app").map(String::as_str), Some("db"));
    }
}
