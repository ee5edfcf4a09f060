//! MySQLCluster Custom Resource Definition
//!
//! Describes the desired state of a replicated MySQL cluster. The names of the
//! objects derived from a cluster are a pure function of the cluster's name, so
//! they can be located again without any stored inventory.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// MySQLCluster is the Schema for the mysqlclusters API
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cr.mysqloperator.grtl.github.com",
    version = "v1",
    kind = "MySQLCluster",
    plural = "mysqlclusters",
    namespaced,
    status = "ClusterStatus",
    shortname = "mysql",
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Name of the Secret holding the root password under the `password` key
    pub password: String,

    /// Size of the persistent volume of each instance (e.g., "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,

    /// Number of MySQL instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// MySQL port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,

    /// Container image to use for MySQL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Name of the MySQLBackupInstance to seed the cluster from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_backup: Option<String>,
}

/// Status of the MySQLCluster
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Outcome of the last reconciliation ("Successful update", "Failed update")
    #[serde(default)]
    pub state: String,
    /// Human-readable detail for the state
    #[serde(default)]
    pub message: String,
    /// Time of the last status write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,
}

pub const DEFAULT_STORAGE: &str = "1Gi";
pub const DEFAULT_REPLICAS: i32 = 2;
pub const DEFAULT_PORT: i32 = 3306;
pub const DEFAULT_IMAGE: &str = "mysql:5.7";

impl ClusterSpec {
    /// Fill every unset optional field with its default. Set fields are left alone.
    pub fn with_defaults(mut self) -> Self {
        self.storage.get_or_insert_with(|| DEFAULT_STORAGE.to_string());
        self.replicas.get_or_insert(DEFAULT_REPLICAS);
        self.port.get_or_insert(DEFAULT_PORT);
        self.image.get_or_insert_with(|| DEFAULT_IMAGE.to_string());
        self
    }
}

impl MySQLCluster {
    /// Copy of this cluster with a defaulted spec.
    pub fn with_defaults(&self) -> Self {
        let mut cluster = self.clone();
        cluster.spec = cluster.spec.with_defaults();
        cluster
    }
}

/// Name of the read-write Service of a cluster.
pub fn service_name(cluster_name: &str) -> String {
    cluster_name.to_string()
}

/// Name of the read-only Service of a cluster.
pub fn read_service_name(cluster_name: &str) -> String {
    format!("{}-read", cluster_name)
}

/// Name of the StatefulSet of a cluster.
pub fn stateful_set_name(cluster_name: &str) -> String {
    cluster_name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_spec_defaults() {
        let spec: ClusterSpec = serde_json::from_str(r#"{"password":"root-secret"}"#).unwrap();
        assert_eq!(spec.replicas, None);

        let spec = spec.with_defaults();
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(spec.port, Some(3306));
        assert_eq!(spec.storage.as_deref(), Some("1Gi"));
        assert_eq!(spec.image.as_deref(), Some("mysql:5.7"));
        assert_eq!(spec.from_backup, None);
    }

    #[test]
    fn test_defaults_keep_explicit_values() {
        let spec = ClusterSpec {
            password: "root-secret".to_string(),
            storage: Some("20Gi".to_string()),
            replicas: Some(5),
            ..Default::default()
        }
        .with_defaults();

        assert_eq!(spec.replicas, Some(5));
        assert_eq!(spec.storage.as_deref(), Some("20Gi"));
        assert_eq!(spec, spec.clone().with_defaults());
    }

    #[test]
    fn test_from_backup_is_camel_case() {
        let spec: ClusterSpec =
            serde_json::from_str(r#"{"password":"p","fromBackup":"nightly-1"}"#).unwrap();
        assert_eq!(spec.from_backup.as_deref(), Some("nightly-1"));
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(service_name("orders"), "orders");
        assert_eq!(read_service_name("orders"), "orders-read");
        assert_eq!(stateful_set_name("orders"), "orders");
    }
}
