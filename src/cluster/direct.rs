use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::api::{Api, ListParams};
use kube::Client;

use crate::cluster::{ClusterReader, LabelSelector};
use crate::errors::Error;
use crate::metrics;

/// Synchronous queries against the API server, used until the snapshot is ready
#[derive(Clone)]
pub struct DirectReader {
    client: Client,
}

impl DirectReader {
    pub fn new(client: Client) -> Self {
        DirectReader { client }
    }
}

fn list_params(selector: &LabelSelector) -> ListParams {
    if selector.is_empty() {
        ListParams::default()
    } else {
        ListParams::default().labels(&selector.to_string())
    }
}

fn kube_error(action: &str, err: kube::Error) -> Error {
    metrics::kube_error_happened(action, &err);
    Error::KubeError(err)
}

#[async_trait]
impl ClusterReader for DirectReader {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces
            .get_opt(name)
            .await
            .map_err(|err| kube_error("get_namespace", err))
    }

    async fn list_pods(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<Pod>, Error> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods
            .list(&list_params(selector))
            .await
            .map_err(|err| kube_error("list_pods", err))?;
        Ok(list.items)
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, Error> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        nodes.get_opt(name).await.map_err(|err| kube_error("get_node", err))
    }

    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, Error> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&list_params(selector))
            .await
            .map_err(|err| kube_error("list_nodes", err))?;
        Ok(list.items)
    }
}
