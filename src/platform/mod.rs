//! Platform Client
//!
//! Typed operations against the orchestration platform for the objects a
//! cluster owns. Every call can independently succeed, find the object already
//! present, find it missing, or fail; the error variants of
//! [`OperatorError`](crate::error::OperatorError) carry that distinction.

mod kubernetes;
mod memory;

pub(crate) use kubernetes::with_deadline;
pub use kubernetes::KubePlatform;
pub use memory::{Call, InMemoryPlatform, Operation};

use crate::crd::{MySQLBackupInstance, MySQLCluster};
use crate::error::Result;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use std::fmt;

/// Kinds of objects the operator touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Service,
    StatefulSet,
    BackupInstance,
    Cluster,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Service => write!(f, "Service"),
            ObjectKind::StatefulSet => write!(f, "StatefulSet"),
            ObjectKind::BackupInstance => write!(f, "MySQLBackupInstance"),
            ObjectKind::Cluster => write!(f, "MySQLCluster"),
        }
    }
}

/// Remote operations needed to reconcile a MySQLCluster
#[async_trait::async_trait]
pub trait PlatformClient: Send + Sync {
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service>;

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service>;

    /// Replace a Service. The object must carry the current resource version.
    async fn update_service(&self, namespace: &str, service: &Service) -> Result<Service>;

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()>;

    async fn create_stateful_set(&self, namespace: &str, sts: &StatefulSet)
        -> Result<StatefulSet>;

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet>;

    /// Replace a StatefulSet. The object must carry the current resource version.
    async fn update_stateful_set(&self, namespace: &str, sts: &StatefulSet)
        -> Result<StatefulSet>;

    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> Result<()>;

    async fn get_backup_instance(&self, namespace: &str, name: &str)
        -> Result<MySQLBackupInstance>;

    /// Persist `cluster.status`; nothing else of the cluster is written.
    async fn update_cluster_status(&self, cluster: &MySQLCluster) -> Result<()>;
}
