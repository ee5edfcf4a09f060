//! Custom Resource Definitions for the MySQL Kubernetes Operator
//!
//! - MySQLCluster: desired state of a replicated MySQL cluster
//! - MySQLBackupInstance: a backup a cluster can be seeded from

mod backup;
mod cluster;

pub use backup::{BackupInstanceSpec, BackupInstanceStatus, BackupPhase, MySQLBackupInstance};
pub use cluster::{
    read_service_name, service_name, stateful_set_name, ClusterSpec, ClusterStatus, MySQLCluster,
    DEFAULT_IMAGE, DEFAULT_PORT, DEFAULT_REPLICAS, DEFAULT_STORAGE,
};
