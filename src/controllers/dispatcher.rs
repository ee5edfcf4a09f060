//! Event Dispatcher
//!
//! Routes cluster notifications to one worker task per cluster identity.
//! Each worker owns a mailbox and handles its notifications strictly in arrival
//! order, so an update never overtakes the create it depends on. Workers of
//! different clusters run concurrently.
//!
//! A Deleted notification retires its worker once the mailbox drains. If the
//! same identity shows up again, the new worker first waits for the retired one
//! to finish.

use super::ClusterOperator;
use crate::crd::MySQLCluster;
use futures::{FutureExt, Stream, StreamExt};
use kube::runtime::reflector::ObjectRef;
use kube::ResourceExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Kind of change observed for a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Added,
    Modified,
    Deleted,
}

/// A change to a MySQLCluster resource
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub cluster: MySQLCluster,
}

impl Notification {
    pub fn added(cluster: MySQLCluster) -> Self {
        Self {
            kind: NotificationKind::Added,
            cluster,
        }
    }

    pub fn modified(cluster: MySQLCluster) -> Self {
        Self {
            kind: NotificationKind::Modified,
            cluster,
        }
    }

    pub fn deleted(cluster: MySQLCluster) -> Self {
        Self {
            kind: NotificationKind::Deleted,
            cluster,
        }
    }

    /// Identity of the cluster this notification is about
    pub fn key(&self) -> ObjectRef<MySQLCluster> {
        ObjectRef::from_obj(&self.cluster)
    }
}

struct Worker {
    mailbox: mpsc::UnboundedSender<Notification>,
    handle: JoinHandle<()>,
}

/// Serializes notifications per cluster and runs different clusters in parallel
pub struct EventDispatcher<O> {
    operator: Arc<O>,
    workers: HashMap<ObjectRef<MySQLCluster>, Worker>,
    retired: HashMap<ObjectRef<MySQLCluster>, JoinHandle<()>>,
}

impl<O> EventDispatcher<O>
where
    O: ClusterOperator + 'static,
{
    pub fn new(operator: Arc<O>) -> Self {
        Self {
            operator,
            workers: HashMap::new(),
            retired: HashMap::new(),
        }
    }

    /// Number of clusters with a live worker
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue a notification on its cluster's worker. Never blocks on reconciliation.
    pub fn dispatch(&mut self, notification: Notification) {
        self.retired.retain(|_, handle| !handle.is_finished());

        let key = notification.key();
        let kind = notification.kind;

        if !self.workers.contains_key(&key) {
            let previous = self.retired.remove(&key);
            let worker = spawn_worker(Arc::clone(&self.operator), previous);
            self.workers.insert(key.clone(), worker);
        }

        if let Some(worker) = self.workers.get(&key) {
            if let Err(rejected) = worker.mailbox.send(notification) {
                error!(
                    cluster = %identity(&rejected.0.cluster),
                    "Worker mailbox closed, dropping notification"
                );
            }
        }

        if kind == NotificationKind::Deleted {
            if let Some(worker) = self.workers.remove(&key) {
                // Dropping the sender lets the worker exit after draining its mailbox
                drop(worker.mailbox);
                self.retired.insert(key, worker.handle);
            }
        }
    }

    /// Dispatch every notification of `notifications`, then wait for all
    /// queued work to finish.
    pub async fn run<S>(mut self, notifications: S)
    where
        S: Stream<Item = Notification>,
    {
        info!("Starting MySQLCluster event dispatcher");
        let mut notifications = std::pin::pin!(notifications);
        while let Some(notification) = notifications.next().await {
            self.dispatch(notification);
        }
        info!("Notification stream ended");
        self.shutdown().await;
    }

    /// Close every mailbox and wait for the workers to drain them
    pub async fn shutdown(self) {
        let mut handles: Vec<JoinHandle<()>> = self.retired.into_values().collect();
        for (_, worker) in self.workers {
            drop(worker.mailbox);
            handles.push(worker.handle);
        }
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Cluster worker failed");
            }
        }
    }
}

fn spawn_worker<O>(operator: Arc<O>, previous: Option<JoinHandle<()>>) -> Worker
where
    O: ClusterOperator + 'static,
{
    let (mailbox, inbox) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run_worker(operator, inbox, previous));
    Worker { mailbox, handle }
}

async fn run_worker<O>(
    operator: Arc<O>,
    mut inbox: mpsc::UnboundedReceiver<Notification>,
    previous: Option<JoinHandle<()>>,
) where
    O: ClusterOperator,
{
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    while let Some(notification) = inbox.recv().await {
        let cluster = identity(&notification.cluster);
        let kind = notification.kind;
        let outcome = AssertUnwindSafe(handle(operator.as_ref(), &notification))
            .catch_unwind()
            .await;
        if outcome.is_err() {
            error!(cluster = %cluster, kind = ?kind, "Reconciliation panicked");
        }
    }
}

async fn handle<O>(operator: &O, notification: &Notification)
where
    O: ClusterOperator + ?Sized,
{
    let cluster = &notification.cluster;
    debug!(cluster = %identity(cluster), kind = ?notification.kind, "Handling notification");

    let result = match notification.kind {
        NotificationKind::Added => operator.add_cluster(cluster).await,
        NotificationKind::Modified => operator.update_cluster(cluster).await,
        NotificationKind::Deleted => operator.delete_cluster(cluster).await,
    };

    match result {
        Ok(()) => info!(cluster = %identity(cluster), kind = ?notification.kind, "Reconciled cluster"),
        Err(e) => error!(
            cluster = %identity(cluster),
            kind = ?notification.kind,
            error = %e,
            "Reconciliation failed"
        ),
    }
}

fn identity(cluster: &MySQLCluster) -> String {
    format!(
        "{}/{}",
        cluster.namespace().unwrap_or_else(|| "default".to_string()),
        cluster.name_any()
    )
}
