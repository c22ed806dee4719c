use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Key '{0}' is empty")]
    MissingKey(&'static str),

    #[error("Kube API Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("unmarshal to {kind}: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("parse {label} label '{value}' on {scope}: {reason}")]
    InvalidWeight {
        label: &'static str,
        value: String,
        scope: &'static str,
        reason: String,
    },

    #[error("{0}")]
    Veto(String),

    #[error("marshal patch: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("attach patch: {0}")]
    Patch(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Environment error: {0}")]
    Envy(#[from] envy::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Vetoes are business decisions, everything else is a technical failure
    pub fn is_veto(&self) -> bool {
        matches!(self, Error::Veto(_))
    }
}
