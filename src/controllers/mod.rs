//! Controllers for the MySQL Kubernetes Operator
//!
//! Cluster change notifications flow from the watch adapter ([`source`])
//! through the [`EventDispatcher`], which serializes them per cluster and hands
//! them to a [`ClusterOperator`].

mod cluster;
mod dispatcher;
pub mod source;

pub use cluster::ClusterReconciler;
pub use dispatcher::{EventDispatcher, Notification, NotificationKind};
pub use source::{cluster_notifications, NotificationTracker};

use crate::crd::MySQLCluster;
use crate::error::Result;

/// Operations that converge the platform onto a MySQLCluster
#[async_trait::async_trait]
pub trait ClusterOperator: Send + Sync {
    /// Create the objects of a new cluster
    async fn add_cluster(&self, cluster: &MySQLCluster) -> Result<()>;

    /// Bring existing objects in line with a changed spec and record the outcome in the status
    async fn update_cluster(&self, cluster: &MySQLCluster) -> Result<()>;

    /// Remove the objects of a deleted cluster
    async fn delete_cluster(&self, cluster: &MySQLCluster) -> Result<()>;
}
