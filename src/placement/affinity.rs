use k8s_openapi::api::core::v1::{
    Affinity, NodeAffinity, NodeSelectorRequirement, NodeSelectorTerm, PodAffinityTerm, PodAntiAffinity,
    PreferredSchedulingTerm, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;

use crate::placement::CapacityClass;
use crate::policy::EffectivePolicy;
use crate::{CAPACITY_LABEL, HOSTNAME_TOPOLOGY_KEY};

/// Weight of the anti-affinity term spreading replicas across nodes
pub const SPREAD_WEIGHT: i32 = 1;

/// Take over existing rules and make sure the collections we append to exist
pub fn fill(affinity: Option<Affinity>) -> Affinity {
    let mut affinity = affinity.unwrap_or_default();
    node_preferences(&mut affinity);
    anti_affinity_preferences(&mut affinity);
    affinity
}

fn node_preferences(affinity: &mut Affinity) -> &mut Vec<PreferredSchedulingTerm> {
    affinity
        .node_affinity
        .get_or_insert_with(NodeAffinity::default)
        .preferred_during_scheduling_ignored_during_execution
        .get_or_insert_with(Vec::new)
}

fn anti_affinity_preferences(affinity: &mut Affinity) -> &mut Vec<WeightedPodAffinityTerm> {
    affinity
        .pod_anti_affinity
        .get_or_insert_with(PodAntiAffinity::default)
        .preferred_during_scheduling_ignored_during_execution
        .get_or_insert_with(Vec::new)
}

pub fn capacity_preference(class: CapacityClass, weight: i32) -> PreferredSchedulingTerm {
    PreferredSchedulingTerm {
        weight,
        preference: NodeSelectorTerm {
            match_expressions: Some(vec![NodeSelectorRequirement {
                key: CAPACITY_LABEL.to_owned(),
                operator: "In".to_owned(),
                values: Some(vec![class.label_value().to_owned()]),
            }]),
            ..NodeSelectorTerm::default()
        },
    }
}

/// Append the Spot and OnDemand preferences after whatever is already there.
/// A zero weight is not a valid preferred term, so that class is left out.
pub fn append_capacity_preferences(affinity: &mut Affinity, policy: &EffectivePolicy) {
    let preferences = node_preferences(affinity);
    for (class, weight) in [
        (CapacityClass::Spot, policy.spot_weight),
        (CapacityClass::OnDemand, policy.on_demand_weight),
    ] {
        if weight > 0 {
            preferences.push(capacity_preference(class, weight));
        }
    }
}

pub fn spread_term(selector: Option<LabelSelector>) -> WeightedPodAffinityTerm {
    WeightedPodAffinityTerm {
        weight: SPREAD_WEIGHT,
        pod_affinity_term: PodAffinityTerm {
            label_selector: selector,
            topology_key: HOSTNAME_TOPOLOGY_KEY.to_owned(),
            ..PodAffinityTerm::default()
        },
    }
}

pub fn append_spread(affinity: &mut Affinity, selector: Option<LabelSelector>) {
    anti_affinity_preferences(affinity).push(spread_term(selector));
}
