use prometheus::{IntCounterVec, Opts, Registry};

use kube::Error;
use lazy_static::lazy_static;

pub const METRICS_NAMESPACE: &str = "mix_scheduler_admission_webhook";

lazy_static! {
    pub static ref KUBE_ERRORS: IntCounterVec = IntCounterVec::new(
      Opts::new("kube_errors", "mix-scheduler-admission-webhook k8s related errors")
      .namespace(METRICS_NAMESPACE),
      &["action", "kube_name"]
    ).unwrap();
    pub static ref ERRORS: IntCounterVec = IntCounterVec::new(
      Opts::new("errors", "mix-scheduler-admission-webhook errors")
      .namespace(METRICS_NAMESPACE),
      &["name"]
    ).unwrap();
    pub static ref ADMISSIONS: IntCounterVec = IntCounterVec::new(
      Opts::new("admissions", "admission verdicts by object kind, operation and outcome")
      .namespace(METRICS_NAMESPACE),
      &["kind", "operation", "outcome"]
    ).unwrap();
}

pub fn custom_metrics(registry: &Registry) -> prometheus::Result<()> {
  registry.register(Box::new(KUBE_ERRORS.clone()))?;
  registry.register(Box::new(ERRORS.clone()))?;
  registry.register(Box::new(ADMISSIONS.clone()))?;
  Ok(())
}

pub fn kube_error_name(err: &Error) -> &'static str {
  match err {
    Error::Api(_) => "api",
    Error::HyperError(_) => "hyper_error",
    Error::HttpError(_) => "http_error",
    Error::SerdeError(_) => "serde_error",
    _ => "other",
  }
}

pub fn kube_error_happened(action: &str, err: &Error) {
  KUBE_ERRORS.with_label_values(&[action, kube_error_name(err)]).inc_by(1);
}

pub fn error_happened(name: &str) {
  ERRORS.with_label_values(&[name]).inc_by(1);
}

pub fn admission_happened(kind: &str, operation: &str, outcome: &str) {
  ADMISSIONS.with_label_values(&[kind, operation, outcome]).inc_by(1);
}
