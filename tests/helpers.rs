use std::sync::Arc;

use actix_web::web;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::runtime::watcher::Event;
use serde_json::{json, Value};
use serde_yaml;

use mix_scheduler_admission_webhook::cluster::snapshot::{snapshot, ApplyEvent};
use mix_scheduler_admission_webhook::cluster::ReadinessGate;
use mix_scheduler_admission_webhook::views::AppState;
use mix_scheduler_admission_webhook::{AdmissionEngine, Config, CAPACITY_LABEL};

pub const UID: &str = "705ab4f5-6393-11e8-b7cc-42010a800002";

// Node fixture, labeled with a capacity class when one is given
pub fn node(name: &str, capacity: Option<&str>) -> Node {
    let labels = match capacity {
        Some(capacity) => format!("  labels:\n    {}: {}\n", CAPACITY_LABEL, capacity),
        None => String::new(),
    };
    serde_yaml::from_str(&format!("apiVersion: v1\nkind: Node\nmetadata:\n  name: {}\n{}", name, labels))
        .expect("Unable to parse node fixture")
}

pub fn pod_json(name: &str, app: &str, node: &str, ready: bool) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name, "namespace": "default", "labels": {"app": app}},
        "spec": {
            "nodeName": node,
            "containers": [{"name": "main", "image": "nginx"}],
        },
        "status": {
            "conditions": [{"type": "Ready", "status": if ready { "True" } else { "False" }}],
        },
    })
}

pub fn deployment_json(name: &str) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": "default"},
        "spec": {
            "selector": {"matchLabels": {"app": name}},
            "template": {
                "metadata": {"labels": {"app": name}},
                "spec": {"containers": [{"name": "main", "image": "nginx"}]},
            },
        },
    })
}

// AdmissionReview envelope as the API server posts it
pub fn review_body(operation: &str, kind: &str, object: Option<Value>, old_object: Option<Value>) -> Value {
    let (group, resource) = match kind {
        "Deployment" => ("apps", "deployments"),
        "Pod" => ("", "pods"),
        _ => ("example.com", "widgets"),
    };
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": UID,
            "kind": {"group": group, "version": "v1", "kind": kind},
            "resource": {"group": group, "version": "v1", "resource": resource},
            "namespace": "default",
            "operation": operation,
            "userInfo": {"username": "admin"},
            "object": object,
            "oldObject": old_object,
            "dryRun": false,
        }
    })
}

// App state over a snapshot holding the given nodes and pods
pub fn app_state(nodes: Vec<Node>, pods: Vec<Pod>) -> web::Data<AppState> {
    let (reader, writer) = snapshot();
    writer.apply(Event::Restarted(nodes));
    writer.apply(Event::Restarted(pods));
    writer.apply(Event::<Namespace>::Restarted(vec![]));

    web::Data::new(AppState {
        engine: AdmissionEngine::new(Arc::new(Config::default()), Arc::new(reader)),
        gate: ReadinessGate::new(),
    })
}
