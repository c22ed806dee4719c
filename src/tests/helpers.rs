use std::collections::BTreeMap;
use std::convert::TryInto;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use kube::core::DynamicObject;
use kube::runtime::watcher::Event;
use serde_json::{json, Value};

use crate::cluster::snapshot::{snapshot, ApplyEvent, SnapshotReader};
use crate::cluster::{ClusterReader, LabelSelector};
use crate::errors::Error;
use crate::CAPACITY_LABEL;

pub fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn node(name: &str, capacity: Option<&str>) -> Node {
    let mut node: Node = serde_yaml::from_str(&format!(
        r#"
apiVersion: v1
kind: Node
metadata:
  name: {}
"#,
        name
    ))
    .expect("Unable to parse node fixture");
    if let Some(capacity) = capacity {
        node.metadata.labels = Some(labels(&[(CAPACITY_LABEL, capacity)]));
    }
    node
}

pub fn namespace(name: &str, pairs: &[(&str, &str)]) -> Namespace {
    let mut namespace: Namespace = serde_yaml::from_str(&format!(
        r#"
apiVersion: v1
kind: Namespace
metadata:
  name: {}
"#,
        name
    ))
    .expect("Unable to parse namespace fixture");
    namespace.metadata.labels = Some(labels(pairs));
    namespace
}

/// A pod of the `app` replica set, optionally bound to `node` and ready
pub fn pod_json(namespace: &str, name: &str, app: &str, node: Option<&str>, ready: bool) -> Value {
    let mut pod = json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "labels": {"app": app},
        },
        "spec": {
            "containers": [{"name": "main", "image": "nginx"}],
        },
        "status": {
            "conditions": [{"type": "Ready", "status": if ready { "True" } else { "False" }}],
        },
    });
    if let Some(node) = node {
        pod["spec"]["nodeName"] = json!(node);
    }
    pod
}

pub fn pod(namespace: &str, name: &str, app: &str, node: Option<&str>, ready: bool) -> Pod {
    serde_json::from_value(pod_json(namespace, name, app, node, ready)).expect("Unable to parse pod fixture")
}

pub fn deployment_json(namespace: &str, name: &str, instance_labels: &[(&str, &str)], affinity: Option<Value>) -> Value {
    let mut deploy = json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "labels": labels(instance_labels),
        },
        "spec": {
            "replicas": 3,
            "selector": {"matchLabels": {"app": name}},
            "template": {
                "metadata": {"labels": {"app": name}},
                "spec": {
                    "containers": [{"name": "main", "image": "nginx"}],
                },
            },
        },
    });
    if let Some(affinity) = affinity {
        deploy["spec"]["template"]["spec"]["affinity"] = affinity;
    }
    deploy
}

/// Snapshot already holding the given objects, as after an initial list
pub fn cluster(nodes: Vec<Node>, pods: Vec<Pod>, namespaces: Vec<Namespace>) -> SnapshotReader {
    let (reader, writer) = snapshot();
    writer.apply(Event::Restarted(nodes));
    writer.apply(Event::Restarted(pods));
    writer.apply(Event::Restarted(namespaces));
    reader
}

pub fn admission_request(
    operation: &str,
    kind: &str,
    namespace: &str,
    object: Option<Value>,
    old_object: Option<Value>,
) -> AdmissionRequest<DynamicObject> {
    let (group, version, resource) = match kind {
        "Deployment" => ("apps", "v1", "deployments"),
        "StatefulSet" => ("apps", "v1", "statefulsets"),
        "Pod" => ("", "v1", "pods"),
        _ => ("example.com", "v1", "widgets"),
    };
    let review: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": group, "version": version, "kind": kind},
            "resource": {"group": group, "version": version, "resource": resource},
            "namespace": namespace,
            "operation": operation,
            "userInfo": {"username": "admin"},
            "object": object,
            "oldObject": old_object,
            "dryRun": false,
        }
    }))
    .expect("Unable to parse admission review fixture");
    review.try_into().expect("Admission review without a request")
}

/// Reader whose every query fails, like an unreachable API server
pub struct FailingReader;

fn unreachable_api() -> Error {
    Error::Config("API server unreachable".to_owned())
}

#[async_trait]
impl ClusterReader for FailingReader {
    async fn get_namespace(&self, _name: &str) -> Result<Option<Namespace>, Error> {
        Err(unreachable_api())
    }

    async fn list_pods(&self, _namespace: &str, _selector: &LabelSelector) -> Result<Vec<Pod>, Error> {
        Err(unreachable_api())
    }

    async fn get_node(&self, _name: &str) -> Result<Option<Node>, Error> {
        Err(unreachable_api())
    }

    async fn list_nodes(&self, _selector: &LabelSelector) -> Result<Vec<Node>, Error> {
        Err(unreachable_api())
    }
}
