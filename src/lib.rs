use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;

pub mod admission;
pub mod cluster;
pub mod errors;
pub mod metrics;
pub mod placement;
pub mod policy;
pub mod tls;
pub mod views;

#[cfg(test)]
mod tests;

pub use admission::AdmissionEngine;
pub use cluster::{ClusterReader, ClusterStateCache};
pub use errors::Error;
pub use placement::CapacityClass;
pub use policy::EffectivePolicy;

/// Node label naming the capacity class a node belongs to
pub const CAPACITY_LABEL: &str = "node.kubernetes.io/capacity";
pub const SPOT: &str = "spot";
pub const ON_DEMAND: &str = "on-demand";

/// Instance or namespace label switching mutation on and off
pub const ENABLE_LABEL: &str = "mix-scheduler-admission-webhook";
pub const SPOT_WEIGHT_LABEL: &str = "spot/weight";
pub const ON_DEMAND_WEIGHT_LABEL: &str = "on-demand/weight";

pub const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

/// Raw process configuration, read from the environment with `envy`
#[derive(Deserialize, Debug, Clone)]
pub struct EnvironmentConfig {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_mix_scheduler_required")]
    pub mix_scheduler_required: bool,
    #[serde(default = "default_excluded_namespaces")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default = "default_spot_node_weight")]
    pub spot_node_weight: i64,
    #[serde(default = "default_on_demand_node_weight")]
    pub on_demand_node_weight: i64,
    #[serde(default = "default_min_pod_num")]
    pub on_demand_min_pod_num: usize,
    #[serde(default = "default_min_pod_num")]
    pub spot_min_pod_num: usize,
    #[serde(default = "default_tls_dir")]
    pub tls_dir: String,
}

fn default_server_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8443
}

fn default_mix_scheduler_required() -> bool {
    true
}

fn default_excluded_namespaces() -> Vec<String> {
    vec!["kube-system".to_owned(), "mix-scheduler-system".to_owned()]
}

fn default_spot_node_weight() -> i64 {
    10
}

fn default_on_demand_node_weight() -> i64 {
    1
}

fn default_min_pod_num() -> usize {
    1
}

fn default_tls_dir() -> String {
    "/run/secrets/tls".to_owned()
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig {
            server_host: default_server_host(),
            port: default_port(),
            mix_scheduler_required: default_mix_scheduler_required(),
            excluded_namespaces: default_excluded_namespaces(),
            spot_node_weight: default_spot_node_weight(),
            on_demand_node_weight: default_on_demand_node_weight(),
            on_demand_min_pod_num: default_min_pod_num(),
            spot_min_pod_num: default_min_pod_num(),
            tls_dir: default_tls_dir(),
        }
    }
}

/// Validated, immutable configuration shared by every component
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub enabled: bool,
    pub excluded_namespaces: HashSet<String>,
    pub spot_weight: i32,
    pub on_demand_weight: i32,
    pub on_demand_floor: usize,
    pub spot_floor: usize,
    pub tls_dir: PathBuf,
}

impl Config {
    pub fn from_env_config(env_config: EnvironmentConfig) -> Result<Self, Error> {
        let spot_weight = policy::validate_weight(env_config.spot_node_weight)
            .map_err(|reason| Error::Config(format!("SPOT_NODE_WEIGHT: {}", reason)))?;
        let on_demand_weight = policy::validate_weight(env_config.on_demand_node_weight)
            .map_err(|reason| Error::Config(format!("ON_DEMAND_NODE_WEIGHT: {}", reason)))?;

        let excluded_namespaces = env_config
            .excluded_namespaces
            .iter()
            .map(|ns| ns.trim())
            .filter(|ns| !ns.is_empty())
            .map(str::to_owned)
            .collect();

        Ok(Config {
            server_host: env_config.server_host,
            server_port: env_config.port,
            enabled: env_config.mix_scheduler_required,
            excluded_namespaces,
            spot_weight,
            on_demand_weight,
            on_demand_floor: env_config.on_demand_min_pod_num,
            spot_floor: env_config.spot_min_pod_num,
            tls_dir: PathBuf::from(env_config.tls_dir),
        })
    }

    pub fn is_excluded(&self, namespace: &str) -> bool {
        self.excluded_namespaces.contains(namespace)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: default_server_host(),
            server_port: default_port(),
            enabled: default_mix_scheduler_required(),
            excluded_namespaces: default_excluded_namespaces().into_iter().collect(),
            spot_weight: default_spot_node_weight() as i32,
            on_demand_weight: default_on_demand_node_weight() as i32,
            on_demand_floor: default_min_pod_num(),
            spot_floor: default_min_pod_num(),
            tls_dir: PathBuf::from(default_tls_dir()),
        }
    }
}
