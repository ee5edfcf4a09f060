//! Kubernetes-backed platform client

use super::{ObjectKind, PlatformClient};
use crate::crd::{MySQLBackupInstance, MySQLCluster};
use crate::error::{OperatorError, Result};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Platform client talking to the Kubernetes API server.
///
/// Every call is bounded by `timeout`; a call that exceeds it fails with
/// [`OperatorError::Timeout`] and is never retried here.
#[derive(Clone)]
pub struct KubePlatform {
    client: Client,
    timeout: Duration,
}

impl KubePlatform {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    fn services(&self, namespace: &str) -> Api<Service> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn stateful_sets(&self, namespace: &str) -> Api<StatefulSet> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn call<T, F>(&self, kind: ObjectKind, action: &str, name: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, kube::Error>>,
    {
        debug!(kind = %kind, name = %name, "{}", action);
        with_deadline(self.timeout, &format!("{} {} {}", action, kind, name), fut).await
    }
}

/// Await `fut`, failing with [`OperatorError::Timeout`] once `deadline` elapses.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, kube::Error>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(OperatorError::from),
        Err(_) => Err(OperatorError::Timeout(format!("{} after {:?}", what, deadline))),
    }
}

#[async_trait::async_trait]
impl PlatformClient for KubePlatform {
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let api = self.services(namespace);
        self.call(
            ObjectKind::Service,
            "create",
            &service.name_any(),
            api.create(&PostParams::default(), service),
        )
        .await
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        let api = self.services(namespace);
        self.call(ObjectKind::Service, "get", name, api.get(name)).await
    }

    async fn update_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let api = self.services(namespace);
        let name = service.name_any();
        self.call(
            ObjectKind::Service,
            "replace",
            &name,
            api.replace(&name, &PostParams::default(), service),
        )
        .await
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        let api = self.services(namespace);
        self.call(
            ObjectKind::Service,
            "delete",
            name,
            api.delete(name, &DeleteParams::default()),
        )
        .await
        .map(|_| ())
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet> {
        let api = self.stateful_sets(namespace);
        self.call(
            ObjectKind::StatefulSet,
            "create",
            &sts.name_any(),
            api.create(&PostParams::default(), sts),
        )
        .await
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet> {
        let api = self.stateful_sets(namespace);
        self.call(ObjectKind::StatefulSet, "get", name, api.get(name))
            .await
    }

    async fn update_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet> {
        let api = self.stateful_sets(namespace);
        let name = sts.name_any();
        self.call(
            ObjectKind::StatefulSet,
            "replace",
            &name,
            api.replace(&name, &PostParams::default(), sts),
        )
        .await
    }

    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> Result<()> {
        let api = self.stateful_sets(namespace);
        self.call(
            ObjectKind::StatefulSet,
            "delete",
            name,
            api.delete(name, &DeleteParams::default()),
        )
        .await
        .map(|_| ())
    }

    async fn get_backup_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<MySQLBackupInstance> {
        let api: Api<MySQLBackupInstance> = Api::namespaced(self.client.clone(), namespace);
        self.call(ObjectKind::BackupInstance, "get", name, api.get(name))
            .await
    }

    async fn update_cluster_status(&self, cluster: &MySQLCluster) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let name = cluster.name_any();
        let api: Api<MySQLCluster> = Api::namespaced(self.client.clone(), &namespace);

        let patch = serde_json::json!({
            "status": cluster.status
        });

        self.call(
            ObjectKind::Cluster,
            "patch status",
            &name,
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await
        .map(|_| ())
    }
}
