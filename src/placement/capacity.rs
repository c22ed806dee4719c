use std::collections::HashSet;

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use log::{error, info};

use crate::cluster::{ClusterReader, LabelSelector};
use crate::placement::CapacityClass;

const POD_READY: &str = "Ready";
const POD_COMPLETED: &str = "PodCompleted";

/// Ready condition true, or the condition reporting a successfully completed pod
pub fn pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map_or(false, |conditions| {
            conditions.iter().any(|condition| {
                condition.type_ == POD_READY
                    && (condition.status == "True" || condition.reason.as_deref() == Some(POD_COMPLETED))
            })
        })
}

fn bound_node(pod: &Pod) -> Option<&str> {
    pod.spec.as_ref().and_then(|spec| spec.node_name.as_deref())
}

/// Ready pods matching `selector` in `namespace` that run on nodes of `class`.
///
/// `except` names a pod to leave out of the count. Read failures are logged and count as zero.
pub async fn ready_count(
    cluster: &dyn ClusterReader,
    class: CapacityClass,
    namespace: &str,
    selector: &LabelSelector,
    except: Option<&str>,
) -> usize {
    let nodes = match cluster.list_nodes(&class.selector()).await {
        Ok(nodes) => nodes,
        Err(err) => {
            error!("get {} nodes: {}", class, err);
            return 0;
        }
    };
    if nodes.is_empty() {
        info!("no {} nodes", class);
        return 0;
    }
    let members: HashSet<String> = nodes.iter().map(|node| node.name_any()).collect();

    let pods = match cluster.list_pods(namespace, selector).await {
        Ok(pods) => pods,
        Err(err) => {
            error!("get pods in '{}' matching '{}': {}", namespace, selector, err);
            return 0;
        }
    };

    pods.iter()
        .filter(|pod| except.map_or(true, |name| pod.name_any() != name))
        .filter(|pod| bound_node(pod).map_or(false, |node| members.contains(node)))
        .filter(|pod| pod_ready(pod))
        .count()
}

/// Capacity class of a node, `None` when it is unlabeled or cannot be read
pub async fn node_class(cluster: &dyn ClusterReader, node_name: &str) -> Option<CapacityClass> {
    match cluster.get_node(node_name).await {
        Ok(Some(node)) => CapacityClass::of_node(&node),
        Ok(None) => {
            info!("node '{}' not found", node_name);
            None
        }
        Err(err) => {
            error!("get node '{}': {}", node_name, err);
            None
        }
    }
}
