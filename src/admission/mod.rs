//! Routes admission requests by kind and operation and turns decisions into responses.
use std::sync::Arc;

use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use kube::core::DynamicObject;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;

use crate::cluster::ClusterReader;
use crate::errors::Error;
use crate::metrics;
use crate::placement::{self, Decision, WorkloadKind, WorkloadView};
use crate::policy::{self, EffectivePolicy};
use crate::Config;

pub mod patch;

pub struct AdmissionEngine {
    config: Arc<Config>,
    cluster: Arc<dyn ClusterReader>,
}

pub fn operation_name(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

fn decode<K: DeserializeOwned>(kind: WorkloadKind, object: &DynamicObject) -> Result<K, Error> {
    let value = serde_json::to_value(object).map_err(|source| Error::Decode {
        kind: kind.as_str(),
        source,
    })?;
    serde_json::from_value(value).map_err(|source| Error::Decode {
        kind: kind.as_str(),
        source,
    })
}

fn decode_view(kind: WorkloadKind, object: Option<&DynamicObject>, fallback_namespace: &str) -> Result<WorkloadView, Error> {
    let object = object.ok_or(Error::MissingKey(".request.object"))?;
    Ok(match kind {
        WorkloadKind::Deployment => WorkloadView::from_deployment(decode(kind, object)?, fallback_namespace),
        WorkloadKind::StatefulSet => WorkloadView::from_stateful_set(decode(kind, object)?, fallback_namespace),
        WorkloadKind::Pod => WorkloadView::from_pod(decode(kind, object)?, fallback_namespace),
    })
}

impl AdmissionEngine {
    pub fn new(config: Arc<Config>, cluster: Arc<dyn ClusterReader>) -> Self {
        AdmissionEngine { config, cluster }
    }

    /// Answer an admission request: a patch, a plain allow, or a denial with a message
    pub async fn review(&self, request: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let kind = request.kind.kind.as_str();
        let operation = operation_name(&request.operation);

        let outcome = self
            .decide(request)
            .await
            .and_then(|decision| match decision {
                Decision::Skip => Ok(None),
                Decision::Mutate(delta) => patch::build(&delta).map(Some),
            })
            .and_then(|patch| match patch {
                Some(patch) => AdmissionResponse::from(request)
                    .with_patch(patch)
                    .map(|response| (response, "mutated"))
                    .map_err(|err| Error::Patch(err.to_string())),
                None => Ok((AdmissionResponse::from(request), "skipped")),
            });

        match outcome {
            Ok((response, outcome)) => {
                debug!("{} {} '{}': {}", operation, kind, request.name, outcome);
                metrics::admission_happened(kind, operation, outcome);
                response
            }
            Err(err) => {
                if err.is_veto() {
                    warn!("{} {} '{}' vetoed: {}", operation, kind, request.name, err);
                    metrics::admission_happened(kind, operation, "vetoed");
                } else {
                    error!("{} {} '{}' denied: {}", operation, kind, request.name, err);
                    metrics::admission_happened(kind, operation, "denied");
                }
                AdmissionResponse::from(request).deny(err.to_string())
            }
        }
    }

    pub async fn decide(&self, request: &AdmissionRequest<DynamicObject>) -> Result<Decision, Error> {
        let kind = match WorkloadKind::from_kind(&request.kind.kind) {
            Some(kind) => kind,
            None => {
                info!("unknown kind: {}", request.kind.kind);
                return Ok(Decision::Skip);
            }
        };
        let fallback_namespace = request.namespace.clone().unwrap_or_default();

        match (kind, &request.operation) {
            (WorkloadKind::Deployment, Operation::Create | Operation::Update)
            | (WorkloadKind::StatefulSet, Operation::Create | Operation::Update) => {
                let view = decode_view(kind, request.object.as_ref(), &fallback_namespace)?;
                let policy = self.resolve(&view).await?;
                if !policy.enabled {
                    info!("{} '{}/{}' is skipped", kind.as_str(), view.namespace, view.name);
                    return Ok(Decision::Skip);
                }
                Ok(Decision::Mutate(placement::template_constraints(&view, &policy)))
            }
            (WorkloadKind::Pod, Operation::Create) => {
                let view = decode_view(kind, request.object.as_ref(), &fallback_namespace)?;
                let policy = self.resolve(&view).await?;
                if !policy.enabled {
                    info!("Pod '{}/{}' is skipped", view.namespace, view.name);
                    return Ok(Decision::Skip);
                }
                Ok(placement::pod_create_decision(&view, &self.config, self.cluster.as_ref()).await)
            }
            (WorkloadKind::Pod, Operation::Delete) => {
                let view = decode_view(kind, request.old_object.as_ref(), &fallback_namespace)?;
                let policy = self.resolve(&view).await?;
                if policy.enabled {
                    placement::pod_delete_decision(&view, &self.config, self.cluster.as_ref()).await?;
                }
                Ok(Decision::Skip)
            }
            _ => Ok(Decision::Skip),
        }
    }

    async fn resolve(&self, view: &WorkloadView) -> Result<EffectivePolicy, Error> {
        let namespace = match self.cluster.get_namespace(&view.namespace).await {
            Ok(namespace) => namespace,
            Err(err) => {
                warn!("get namespace '{}': {}", view.namespace, err);
                None
            }
        };
        let namespace_labels = namespace.as_ref().and_then(|ns| ns.metadata.labels.as_ref());
        policy::resolve(&self.config, &view.namespace, &view.labels, namespace_labels)
    }
}
