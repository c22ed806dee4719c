use std::fmt::Debug;
use std::sync::Arc;

use futures::future::join_all;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod};
use kube::api::Api;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::{Client, Resource};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use tokio::sync::{oneshot, watch};

use crate::cluster::snapshot::{ApplyEvent, SnapshotWriter};
use crate::cluster::ReadinessGate;
use crate::metrics;

/// Completion signal for the initial list of every watched kind
pub struct SyncHandle {
    synced: Vec<(&'static str, oneshot::Receiver<()>)>,
    gate: ReadinessGate,
}

impl SyncHandle {
    /// Block until pods, nodes and namespaces have all been listed once, then open the gate.
    /// Returns false if a watch stopped before finishing its first list.
    pub async fn wait_until_synced(self) -> bool {
        let kinds: Vec<&'static str> = self.synced.iter().map(|(kind, _)| *kind).collect();
        let results = join_all(self.synced.into_iter().map(|(_, rx)| rx)).await;

        let mut complete = true;
        for (kind, result) in kinds.iter().zip(results) {
            if result.is_err() {
                warn!("Watch for {} stopped before its initial sync", kind);
                complete = false;
            }
        }

        if complete {
            self.gate.mark_ready();
            info!("Cluster state cache synced, serving reads from the snapshot");
        }
        complete
    }
}

pub(crate) fn spawn(
    client: Client,
    writer: SnapshotWriter,
    gate: ReadinessGate,
    shutdown: watch::Receiver<bool>,
) -> SyncHandle {
    let writer = Arc::new(writer);
    let synced = vec![
        (
            "pods",
            spawn_watch::<Pod>("pods", Api::all(client.clone()), writer.clone(), shutdown.clone()),
        ),
        (
            "nodes",
            spawn_watch::<Node>("nodes", Api::all(client.clone()), writer.clone(), shutdown.clone()),
        ),
        (
            "namespaces",
            spawn_watch::<Namespace>("namespaces", Api::all(client), writer, shutdown),
        ),
    ];
    SyncHandle { synced, gate }
}

fn spawn_watch<K>(
    kind: &'static str,
    api: Api<K>,
    writer: Arc<SnapshotWriter>,
    shutdown: watch::Receiver<bool>,
) -> oneshot::Receiver<()>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    SnapshotWriter: ApplyEvent<K>,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(watch_loop(kind, api, writer, tx, shutdown));
    rx
}

/// Keep the snapshot for one kind current until shutdown is signalled
async fn watch_loop<K>(
    kind: &'static str,
    api: Api<K>,
    writer: Arc<SnapshotWriter>,
    synced: oneshot::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    SnapshotWriter: ApplyEvent<K>,
{
    let mut synced = Some(synced);
    let mut events = watcher::watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    info!("Starting {} watch", kind);
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("Stopping {} watch", kind);
                break;
            }
            event = events.next() => match event {
                Some(Ok(event)) => {
                    let relisted = matches!(event, Event::Restarted(_));
                    writer.apply(event);
                    if relisted {
                        debug!("Relisted {}", kind);
                        if let Some(tx) = synced.take() {
                            info!("Initial {} sync complete", kind);
                            let _ = tx.send(());
                        }
                    }
                }
                Some(Err(err)) => {
                    warn!("Watching {} failed, retrying: {}", kind, err);
                    metrics::error_happened(&format!("watch_{}", kind));
                }
                None => {
                    warn!("Watch stream for {} ended", kind);
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::poll;
    use tokio_test::block_on;

    use super::*;

    fn handle() -> (SyncHandle, Vec<oneshot::Sender<()>>) {
        let mut senders = Vec::new();
        let mut synced = Vec::new();
        for kind in ["pods", "nodes", "namespaces"] {
            let (tx, rx) = oneshot::channel();
            senders.push(tx);
            synced.push((kind, rx));
        }
        let handle = SyncHandle {
            synced,
            gate: ReadinessGate::new(),
        };
        (handle, senders)
    }

    #[test]
    fn test_gate_waits_for_every_kind() {
        block_on(async {
            let (handle, mut senders) = handle();
            let gate = handle.gate.clone();
            let waiting = handle.wait_until_synced();
            futures::pin_mut!(waiting);

            let last = senders.pop().unwrap();
            for tx in senders {
                tx.send(()).unwrap();
            }
            assert!(poll!(waiting.as_mut()).is_pending());
            assert!(!gate.is_ready());

            last.send(()).unwrap();
            assert!(waiting.await);
            assert!(gate.is_ready());
        })
    }

    #[test]
    fn test_gate_stays_closed_when_a_watch_ends_early() {
        block_on(async {
            let (handle, mut senders) = handle();
            let gate = handle.gate.clone();

            // nodes watch ends before its first list
            drop(senders.remove(1));
            for tx in senders {
                tx.send(()).unwrap();
            }

            assert!(!handle.wait_until_synced().await);
            assert!(!gate.is_ready());
        })
    }
}
