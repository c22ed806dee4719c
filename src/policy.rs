//! Resolution of the per-request mutation policy.
//!
//! Every field is resolved on its own, walking instance labels, then namespace labels, then
//! the process defaults from `Config`, and taking the first level that supplies a value.
use std::collections::BTreeMap;

use log::{debug, warn};

use crate::errors::Error;
use crate::{Config, ENABLE_LABEL, ON_DEMAND_WEIGHT_LABEL, SPOT_WEIGHT_LABEL};

/// Largest weight the scheduler accepts on a preferred term
pub const MAX_WEIGHT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectivePolicy {
    pub enabled: bool,
    pub spot_weight: i32,
    pub on_demand_weight: i32,
}

impl EffectivePolicy {
    pub fn disabled() -> Self {
        EffectivePolicy {
            enabled: false,
            spot_weight: 0,
            on_demand_weight: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Instance,
    Namespace,
}

impl Scope {
    fn as_str(self) -> &'static str {
        match self {
            Scope::Instance => "instance",
            Scope::Namespace => "namespace",
        }
    }
}

pub fn resolve(
    config: &Config,
    namespace: &str,
    instance_labels: &BTreeMap<String, String>,
    namespace_labels: Option<&BTreeMap<String, String>>,
) -> Result<EffectivePolicy, Error> {
    if config.is_excluded(namespace) {
        debug!("Namespace '{}' is excluded from mutation", namespace);
        return Ok(EffectivePolicy::disabled());
    }

    let enabled = switch_value(instance_labels, Scope::Instance)
        .or_else(|| namespace_labels.and_then(|labels| switch_value(labels, Scope::Namespace)))
        .unwrap_or(config.enabled);
    if !enabled {
        return Ok(EffectivePolicy::disabled());
    }

    let spot_weight = resolve_weight(SPOT_WEIGHT_LABEL, instance_labels, namespace_labels)?
        .unwrap_or(config.spot_weight);
    let on_demand_weight = resolve_weight(ON_DEMAND_WEIGHT_LABEL, instance_labels, namespace_labels)?
        .unwrap_or(config.on_demand_weight);

    Ok(EffectivePolicy {
        enabled,
        spot_weight,
        on_demand_weight,
    })
}

/// Only the exact strings "true" and "false" count; anything else reads as unset
fn switch_value(labels: &BTreeMap<String, String>, scope: Scope) -> Option<bool> {
    match labels.get(ENABLE_LABEL).map(String::as_str) {
        None | Some("") => None,
        Some("true") => Some(true),
        Some("false") => Some(false),
        Some(other) => {
            warn!(
                "Ignoring {} label '{}={}', expected \"true\" or \"false\"",
                scope.as_str(),
                ENABLE_LABEL,
                other
            );
            None
        }
    }
}

fn resolve_weight(
    label: &'static str,
    instance_labels: &BTreeMap<String, String>,
    namespace_labels: Option<&BTreeMap<String, String>>,
) -> Result<Option<i32>, Error> {
    let candidates = [
        (Scope::Instance, Some(instance_labels)),
        (Scope::Namespace, namespace_labels),
    ];

    for (scope, labels) in candidates {
        if let Some(value) = labels.and_then(|labels| labels.get(label)) {
            return parse_weight(label, value, scope).map(Some);
        }
    }
    Ok(None)
}

fn parse_weight(label: &'static str, value: &str, scope: Scope) -> Result<i32, Error> {
    let invalid = |reason: String| Error::InvalidWeight {
        label,
        value: value.to_owned(),
        scope: scope.as_str(),
        reason,
    };
    let parsed = value.trim().parse::<i64>().map_err(|err| invalid(err.to_string()))?;
    validate_weight(parsed).map_err(invalid)
}

/// Weights must lie in `0..=MAX_WEIGHT`; zero means "no preference"
pub fn validate_weight(weight: i64) -> Result<i32, String> {
    if weight < 0 {
        return Err("weight must be >= 0".to_owned());
    }
    if weight > MAX_WEIGHT {
        return Err(format!("weight must be <= {}", MAX_WEIGHT));
    }
    Ok(weight as i32)
}
