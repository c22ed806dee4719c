//! Placement decisions for templates and bare pods.
//!
//! Templates always get the capacity preferences and a spread term. Pods are decided
//! against live cluster state: creation fills the on-demand floor first, deletion is
//! vetoed when it would break the floor with no spot replicas to cover for it.
use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::{Affinity, Node};
use kube::ResourceExt;
use log::{debug, info};

use crate::cluster::{ClusterReader, LabelSelector};
use crate::errors::Error;
use crate::policy::EffectivePolicy;
use crate::{Config, CAPACITY_LABEL, ON_DEMAND, SPOT};

pub mod affinity;
pub mod capacity;
pub mod workload;

pub use workload::{WorkloadKind, WorkloadView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapacityClass {
    Spot,
    OnDemand,
}

impl CapacityClass {
    pub fn label_value(&self) -> &'static str {
        match self {
            CapacityClass::Spot => SPOT,
            CapacityClass::OnDemand => ON_DEMAND,
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            SPOT => Some(CapacityClass::Spot),
            ON_DEMAND => Some(CapacityClass::OnDemand),
            _ => None,
        }
    }

    pub fn of_node(node: &Node) -> Option<Self> {
        node.labels()
            .get(CAPACITY_LABEL)
            .and_then(|value| CapacityClass::from_label(value))
    }

    /// Selects every node of this class
    pub fn selector(&self) -> LabelSelector {
        LabelSelector::new().with(CAPACITY_LABEL, self.label_value())
    }
}

impl fmt::Display for CapacityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_value())
    }
}

/// New value for one field of the pod spec, and whether the field was already set
#[derive(Debug, Clone, PartialEq)]
pub struct Replacement<T> {
    pub value: T,
    pub existed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDelta {
    pub pod_spec_path: &'static str,
    pub affinity: Option<Replacement<Affinity>>,
    pub node_selector: Option<Replacement<BTreeMap<String, String>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Skip,
    Mutate(ConstraintDelta),
}

/// Capacity preferences plus a spread term, appended to the template's existing rules.
///
/// Appending is not idempotent: admitting an already mutated template again adds the same
/// three entries a second time.
pub fn template_constraints(view: &WorkloadView, policy: &EffectivePolicy) -> ConstraintDelta {
    let existed = view.affinity.is_some();
    let mut value = affinity::fill(view.affinity.clone());
    affinity::append_capacity_preferences(&mut value, policy);
    affinity::append_spread(&mut value, view.selector.clone());

    ConstraintDelta {
        pod_spec_path: view.kind.pod_spec_path(),
        affinity: Some(Replacement { value, existed }),
        node_selector: None,
    }
}

/// Pin a new pod to on-demand capacity until its replica set has met the on-demand floor
pub async fn pod_create_decision(view: &WorkloadView, config: &Config, cluster: &dyn ClusterReader) -> Decision {
    let selector = view.replica_selector();
    if selector.is_empty() {
        debug!("Pod '{}/{}' has no replica labels, nothing to count against", view.namespace, view.name);
        return Decision::Skip;
    }

    let on_demand = capacity::ready_count(cluster, CapacityClass::OnDemand, &view.namespace, &selector, None).await;
    if on_demand >= config.on_demand_floor {
        info!(
            "Pod '{}/{}': {} ready on-demand replicas meet the floor of {}",
            view.namespace, view.name, on_demand, config.on_demand_floor
        );
        return Decision::Skip;
    }

    info!(
        "Pod '{}/{}': {} ready on-demand replicas, below the floor of {}, pinning to on-demand",
        view.namespace, view.name, on_demand, config.on_demand_floor
    );

    let mut node_selector = view.node_selector.clone().unwrap_or_default();
    node_selector.insert(CAPACITY_LABEL.to_owned(), ON_DEMAND.to_owned());

    let mut value = affinity::fill(view.affinity.clone());
    affinity::append_spread(&mut value, view.selector.clone());

    Decision::Mutate(ConstraintDelta {
        pod_spec_path: view.kind.pod_spec_path(),
        affinity: Some(Replacement {
            value,
            existed: view.affinity.is_some(),
        }),
        node_selector: Some(Replacement {
            value: node_selector,
            existed: view.node_selector.is_some(),
        }),
    })
}

/// Veto deleting a ready on-demand pod when that breaks the on-demand floor and the
/// spot replicas are themselves below their floor
pub async fn pod_delete_decision(view: &WorkloadView, config: &Config, cluster: &dyn ClusterReader) -> Result<(), Error> {
    let node_name = match &view.node_name {
        Some(node_name) => node_name,
        None => return Ok(()),
    };
    let selector = view.replica_selector();
    if !view.ready || selector.is_empty() {
        return Ok(());
    }
    if capacity::node_class(cluster, node_name).await != Some(CapacityClass::OnDemand) {
        return Ok(());
    }

    let on_demand_after = capacity::ready_count(
        cluster,
        CapacityClass::OnDemand,
        &view.namespace,
        &selector,
        Some(&view.name),
    )
    .await;
    let spot = capacity::ready_count(cluster, CapacityClass::Spot, &view.namespace, &selector, None).await;

    debug!(
        "Deleting pod '{}/{}' leaves {} on-demand (floor {}) and {} spot (floor {}) ready replicas",
        view.namespace, view.name, on_demand_after, config.on_demand_floor, spot, config.spot_floor
    );

    if on_demand_after < config.on_demand_floor && spot < config.spot_floor {
        return Err(Error::Veto(format!(
            "deleting pod {}/{} would leave {} ready on-demand replicas (floor {}) with only {} ready spot replicas (floor {})",
            view.namespace, view.name, on_demand_after, config.on_demand_floor, spot, config.spot_floor
        )));
    }
    Ok(())
}
