//! MySQL Kubernetes Operator
//!
//! A Kubernetes operator that runs replicated MySQL clusters.
//!
//! ## Custom Resources
//!
//! - `MySQLCluster`: a MySQL cluster, deployed as a StatefulSet behind a
//!   read-write Service (`<name>`) and a read-only Service (`<name>-read`)
//! - `MySQLBackupInstance`: a backup a new cluster can be seeded from
//!
//! ## Example
//!
//! ```yaml
//! apiVersion: cr.mysqloperator.grtl.github.com/v1
//! kind: MySQLCluster
//! metadata:
//!   name: orders
//! spec:
//!   password: orders-root-password
//!   replicas: 3
//!   storage: 10Gi
//! ```

pub mod controllers;
pub mod crd;
pub mod error;
pub mod platform;
pub mod registrar;
pub mod status;
pub mod template;

pub use controllers::{
    ClusterOperator, ClusterReconciler, EventDispatcher, Notification, NotificationKind,
};
pub use crd::{ClusterSpec, ClusterStatus, MySQLBackupInstance, MySQLCluster};
pub use error::{OperatorError, Result};
pub use platform::{InMemoryPlatform, KubePlatform, PlatformClient};
pub use template::{TemplateRenderer, TemplateSet};
