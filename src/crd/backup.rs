//! MySQLBackupInstance CRD
//!
//! A single point-in-time backup of a MySQL cluster. Clusters may be seeded
//! from one through `spec.fromBackup`; the operator only ever reads these.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Spec for a MySQLBackupInstance resource
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[kube(
    group = "cr.mysqloperator.grtl.github.com",
    version = "v1",
    kind = "MySQLBackupInstance",
    plural = "mysqlbackupinstances",
    namespaced,
    status = "BackupInstanceStatus",
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".spec.cluster"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackupInstanceSpec {
    /// Schedule that produced this backup; also names the PVC holding the files
    pub schedule: String,

    /// Cluster the backup was taken from
    pub cluster: String,
}

/// Status of a MySQLBackupInstance resource
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupInstanceStatus {
    /// Current phase of the backup
    #[serde(default)]
    pub phase: BackupPhase,
}

/// Phase of a backup operation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum BackupPhase {
    /// Backup job has been started
    #[default]
    Started,
    /// Backup completed successfully
    Completed,
    /// Backup failed
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_spec_parses() {
        let spec: BackupInstanceSpec =
            serde_json::from_str(r#"{"schedule":"nightly","cluster":"orders"}"#).unwrap();
        assert_eq!(spec.schedule, "nightly");
        assert_eq!(spec.cluster, "orders");
    }

    #[test]
    fn test_backup_phase_default() {
        let status = BackupInstanceStatus::default();
        assert_eq!(status.phase, BackupPhase::Started);
    }
}
