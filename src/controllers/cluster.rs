//! Cluster Reconciler
//!
//! Converges the Services and StatefulSet of a MySQLCluster onto its spec.
//!
//! Creation is a multi-step, non-transactional sequence: read-write Service,
//! read-only Service, StatefulSet. Objects that already exist are accepted as
//! is. When a step fails, the steps before it are compensated by deleting what
//! they created, and the caller gets every failure in one composite error.
//! Updates are never rolled back; they record the outcome in the cluster's
//! status instead.

use super::ClusterOperator;
use crate::crd::{
    read_service_name, service_name, stateful_set_name, MySQLBackupInstance, MySQLCluster,
};
use crate::error::{OperatorError, Result};
use crate::platform::PlatformClient;
use crate::status::{
    build_status, MESSAGE_SERVICE_UPDATE_FAILURE, MESSAGE_STATEFUL_SET_UPDATE_FAILURE,
    STATE_FAILED_UPDATE, STATE_SUCCESSFUL_UPDATE,
};
use crate::template::{RenderContext, TemplateId, TemplateRenderer};
use kube::ResourceExt;
use tracing::{debug, info, warn};

/// Reconciles MySQLCluster resources against a [`PlatformClient`]
pub struct ClusterReconciler<P> {
    platform: P,
    renderer: TemplateRenderer,
}

impl<P> ClusterReconciler<P>
where
    P: PlatformClient,
{
    pub fn new(platform: P, renderer: TemplateRenderer) -> Self {
        Self { platform, renderer }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Create a Service, accepting one that already exists
    async fn create_service(&self, cluster: &MySQLCluster, template: TemplateId) -> Result<()> {
        let service = self
            .renderer
            .render_service(template, &RenderContext::new(cluster))?;

        match self.platform.create_service(&namespace(cluster), &service).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_already_exists() => {
                warn!(
                    cluster = %cluster.name_any(),
                    service = %service.name_any(),
                    "Service for cluster already exists"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve the backup named by `spec.fromBackup`, if any
    async fn resolve_backup(&self, cluster: &MySQLCluster) -> Result<Option<MySQLBackupInstance>> {
        match &cluster.spec.from_backup {
            Some(backup) if !backup.is_empty() => {
                debug!(cluster = %cluster.name_any(), backup = %backup, "Fetching backup instance");
                let instance = self
                    .platform
                    .get_backup_instance(&namespace(cluster), backup)
                    .await?;
                Ok(Some(instance))
            }
            _ => Ok(None),
        }
    }

    /// Create the StatefulSet, accepting one that already exists
    async fn create_stateful_set(
        &self,
        cluster: &MySQLCluster,
        backup: Option<&MySQLBackupInstance>,
    ) -> Result<()> {
        let ctx = RenderContext::new(cluster).with_backup(backup);
        let sts = self.renderer.render_stateful_set(&ctx)?;

        match self.platform.create_stateful_set(&namespace(cluster), &sts).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_already_exists() => {
                warn!(cluster = %cluster.name_any(), "StatefulSet for cluster already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn update_services(&self, cluster: &MySQLCluster) -> Result<()> {
        self.update_service(cluster, TemplateId::Service).await?;
        self.update_service(cluster, TemplateId::ReadService).await
    }

    /// Replace a Service with a freshly rendered one.
    ///
    /// The current object is read right before the write to pick up its
    /// resource version. A concurrent writer in between makes the update fail
    /// with a version conflict, which is reported and not retried.
    async fn update_service(&self, cluster: &MySQLCluster, template: TemplateId) -> Result<()> {
        let ns = namespace(cluster);
        let mut service = self
            .renderer
            .render_service(template, &RenderContext::new(cluster))?;

        let current = self.platform.get_service(&ns, &service.name_any()).await?;
        service.metadata.resource_version = current.metadata.resource_version;

        // clusterIP is immutable once allocated
        if let (Some(spec), Some(current_spec)) = (service.spec.as_mut(), current.spec) {
            if current_spec.cluster_ip.is_some() {
                spec.cluster_ip = current_spec.cluster_ip;
                spec.cluster_ips = current_spec.cluster_ips;
            }
        }

        self.platform.update_service(&ns, &service).await?;
        Ok(())
    }

    /// Replace the StatefulSet with a freshly rendered one.
    ///
    /// The backup is not part of the update context: restoring only happens
    /// when the StatefulSet is first created.
    async fn update_stateful_set(&self, cluster: &MySQLCluster) -> Result<()> {
        let ns = namespace(cluster);
        let mut sts = self
            .renderer
            .render_stateful_set(&RenderContext::new(cluster))?;

        let current = self.platform.get_stateful_set(&ns, &sts.name_any()).await?;
        sts.metadata.resource_version = current.metadata.resource_version;

        self.platform.update_stateful_set(&ns, &sts).await?;
        Ok(())
    }

    /// Write `state` and `message` onto the cluster's status
    async fn set_cluster_state(
        &self,
        cluster: &mut MySQLCluster,
        state: &str,
        message: &str,
    ) -> Result<()> {
        cluster.status = Some(build_status(state, message));
        self.platform.update_cluster_status(cluster).await
    }

    async fn remove_service(&self, cluster: &MySQLCluster) -> Result<()> {
        ignore_not_found(
            self.platform
                .delete_service(&namespace(cluster), &service_name(&cluster.name_any()))
                .await,
        )
    }

    async fn remove_read_service(&self, cluster: &MySQLCluster) -> Result<()> {
        ignore_not_found(
            self.platform
                .delete_service(&namespace(cluster), &read_service_name(&cluster.name_any()))
                .await,
        )
    }

    async fn remove_stateful_set(&self, cluster: &MySQLCluster) -> Result<()> {
        ignore_not_found(
            self.platform
                .delete_stateful_set(&namespace(cluster), &stateful_set_name(&cluster.name_any()))
                .await,
        )
    }
}

#[async_trait::async_trait]
impl<P> ClusterOperator for ClusterReconciler<P>
where
    P: PlatformClient,
{
    async fn add_cluster(&self, cluster: &MySQLCluster) -> Result<()> {
        let cluster = cluster.with_defaults();
        let name = cluster.name_any();

        debug!(cluster = %name, "Creating service");
        self.create_service(&cluster, TemplateId::Service).await?;

        debug!(cluster = %name, "Creating read service");
        if let Err(err) = self.create_service(&cluster, TemplateId::ReadService).await {
            warn!(cluster = %name, error = %err, "Reverting service creation");
            let removed = self.remove_service(&cluster).await;
            return Err(OperatorError::aggregate(err, [removed]));
        }

        let backup = self.resolve_backup(&cluster).await?;

        debug!(cluster = %name, "Creating stateful set");
        if let Err(err) = self.create_stateful_set(&cluster, backup.as_ref()).await {
            warn!(cluster = %name, error = %err, "Reverting service creation");
            let removed = self.remove_service(&cluster).await;
            warn!(cluster = %name, error = %err, "Reverting read service creation");
            let removed_read = self.remove_read_service(&cluster).await;
            return Err(OperatorError::aggregate(err, [removed, removed_read]));
        }

        info!(cluster = %name, namespace = %namespace(&cluster), "Cluster objects created");
        Ok(())
    }

    async fn update_cluster(&self, cluster: &MySQLCluster) -> Result<()> {
        let mut cluster = cluster.with_defaults();
        let name = cluster.name_any();

        debug!(cluster = %name, "Updating services");
        if let Err(err) = self.update_services(&cluster).await {
            warn!(cluster = %name, error = %err, "Setting status");
            let status = self
                .set_cluster_state(&mut cluster, STATE_FAILED_UPDATE, MESSAGE_SERVICE_UPDATE_FAILURE)
                .await;
            return Err(OperatorError::aggregate(err, [status]));
        }

        debug!(cluster = %name, "Updating stateful set");
        if let Err(err) = self.update_stateful_set(&cluster).await {
            warn!(cluster = %name, error = %err, "Setting status");
            let status = self
                .set_cluster_state(
                    &mut cluster,
                    STATE_FAILED_UPDATE,
                    MESSAGE_STATEFUL_SET_UPDATE_FAILURE,
                )
                .await;
            return Err(OperatorError::aggregate(err, [status]));
        }

        info!(cluster = %name, namespace = %namespace(&cluster), "Cluster objects updated");
        self.set_cluster_state(&mut cluster, STATE_SUCCESSFUL_UPDATE, "")
            .await
    }

    async fn delete_cluster(&self, cluster: &MySQLCluster) -> Result<()> {
        let name = cluster.name_any();

        debug!(cluster = %name, "Removing cluster objects");
        let outcomes = [
            self.remove_stateful_set(cluster).await,
            self.remove_read_service(cluster).await,
            self.remove_service(cluster).await,
        ];

        let mut failures = outcomes.into_iter().filter_map(|r| r.err());
        match failures.next() {
            None => {
                info!(cluster = %name, namespace = %namespace(cluster), "Cluster objects removed");
                Ok(())
            }
            Some(first) => Err(OperatorError::aggregate(first, failures.map(Err))),
        }
    }
}

fn namespace(cluster: &MySQLCluster) -> String {
    cluster.namespace().unwrap_or_else(|| "default".to_string())
}

/// Deleting an object that is already gone counts as success
fn ignore_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}
