//! Render context passed to object templates

use crate::crd::{read_service_name, service_name, stateful_set_name, MySQLBackupInstance, MySQLCluster};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use serde::Serialize;

/// Names of the objects derived from a cluster, exposed to templates as `names`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ObjectNames {
    pub service: String,
    pub read_service: String,
    pub stateful_set: String,
}

impl ObjectNames {
    pub fn for_cluster(cluster: &MySQLCluster) -> Self {
        let name = cluster.name_any();
        Self {
            service: service_name(&name),
            read_service: read_service_name(&name),
            stateful_set: stateful_set_name(&name),
        }
    }
}

/// Controller reference from a derived object back to its cluster, so the
/// garbage collector removes the object once the cluster is gone.
///
/// Serialized with the API field names (`apiVersion`, `uid`, ...). The uid is
/// empty for a cluster that was never persisted, and templates skip the
/// reference in that case.
pub fn owner_reference(cluster: &MySQLCluster) -> OwnerReference {
    OwnerReference {
        api_version: MySQLCluster::api_version(&()).to_string(),
        kind: MySQLCluster::kind(&()).to_string(),
        name: cluster.name_any(),
        uid: cluster.metadata.uid.clone().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Everything a template can reference: `cluster`, `backup` (none unless the
/// cluster is being seeded from a backup), `names` and `owner`.
#[derive(Debug, Clone, Serialize)]
pub struct RenderContext<'a> {
    pub cluster: &'a MySQLCluster,
    pub backup: Option<&'a MySQLBackupInstance>,
    pub names: ObjectNames,
    pub owner: OwnerReference,
}

impl<'a> RenderContext<'a> {
    pub fn new(cluster: &'a MySQLCluster) -> Self {
        Self {
            cluster,
            backup: None,
            names: ObjectNames::for_cluster(cluster),
            owner: owner_reference(cluster),
        }
    }

    pub fn with_backup(mut self, backup: Option<&'a MySQLBackupInstance>) -> Self {
        self.backup = backup;
        self
    }
}
