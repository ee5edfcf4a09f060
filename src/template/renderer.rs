//! Template Renderer
//!
//! Turns a [`RenderContext`] into typed Kubernetes objects. Rendering is a pure
//! function of the context and the template sources given at construction.

use super::context::RenderContext;
use super::{TemplateId, TemplateSet};
use crate::error::{OperatorError, Result};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use minijinja::{Environment, UndefinedBehavior};
use serde::de::DeserializeOwned;

/// Renders cluster objects from a [`TemplateSet`]
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Compile every template of the set. Syntax errors surface here rather
    /// than on the first reconciliation.
    pub fn new(templates: TemplateSet) -> Result<Self> {
        let mut env = Environment::new();
        // A reference to a missing context field is an error, not an empty string
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        for id in TemplateId::ALL {
            env.add_template_owned(id.file_name(), templates.source(id).to_string())
                .map_err(|e| render_error(id, e))?;
        }

        Ok(Self { env })
    }

    /// Renderer over the built-in templates
    pub fn builtin() -> Result<Self> {
        Self::new(TemplateSet::builtin())
    }

    /// Render a template and deserialize the resulting YAML into `T`.
    pub fn render<T: DeserializeOwned>(&self, id: TemplateId, ctx: &RenderContext<'_>) -> Result<T> {
        let template = self
            .env
            .get_template(id.file_name())
            .map_err(|e| render_error(id, e))?;
        let yaml = template.render(ctx).map_err(|e| render_error(id, e))?;
        serde_yaml::from_str(&yaml).map_err(|e| render_error(id, e))
    }

    /// Render the read-write or read-only Service
    pub fn render_service(&self, id: TemplateId, ctx: &RenderContext<'_>) -> Result<Service> {
        self.render(id, ctx)
    }

    pub fn render_stateful_set(&self, ctx: &RenderContext<'_>) -> Result<StatefulSet> {
        self.render(TemplateId::StatefulSet, ctx)
    }
}

fn render_error(id: TemplateId, err: impl std::fmt::Display) -> OperatorError {
    OperatorError::Render(format!("{}: {}", id.file_name(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{BackupInstanceSpec, ClusterSpec, MySQLBackupInstance, MySQLCluster};

    fn cluster(name: &str) -> MySQLCluster {
        let mut cluster = MySQLCluster::new(
            name,
            ClusterSpec {
                password: "root-secret".to_string(),
                ..Default::default()
            },
        );
        cluster.metadata.namespace = Some("default".to_string());
        cluster.with_defaults()
    }

    #[test]
    fn test_render_services() {
        let renderer = TemplateRenderer::builtin().unwrap();
        let cluster = cluster("orders");
        let ctx = RenderContext::new(&cluster);

        let service = renderer.render_service(TemplateId::Service, &ctx).unwrap();
        assert_eq!(service.metadata.name.as_deref(), Some("orders"));
        let spec = service.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.ports.unwrap()[0].port, 3306);

        let read = renderer.render_service(TemplateId::ReadService, &ctx).unwrap();
        assert_eq!(read.metadata.name.as_deref(), Some("orders-read"));
        assert_eq!(read.spec.unwrap().cluster_ip, None);
    }

    #[test]
    fn test_render_stateful_set_reflects_spec() {
        let renderer = TemplateRenderer::builtin().unwrap();
        let mut cluster = cluster("orders");
        cluster.spec.replicas = Some(4);
        cluster.spec.storage = Some("8Gi".to_string());

        let sts = renderer
            .render_stateful_set(&RenderContext::new(&cluster))
            .unwrap();
        assert_eq!(sts.metadata.name.as_deref(), Some("orders"));

        let spec = sts.spec.unwrap();
        assert_eq!(spec.replicas, Some(4));
        assert_eq!(spec.service_name, "orders");

        let pod = spec.template.spec.unwrap();
        assert!(pod.init_containers.is_none());
        assert_eq!(pod.containers[0].image.as_deref(), Some("mysql:5.7"));

        let claim = &spec.volume_claim_templates.unwrap()[0];
        let requests = claim
            .spec
            .as_ref()
            .and_then(|s| s.resources.as_ref())
            .and_then(|r| r.requests.as_ref())
            .unwrap();
        assert_eq!(requests["storage"].0, "8Gi");
    }

    #[test]
    fn test_render_stateful_set_with_backup_adds_restore() {
        let renderer = TemplateRenderer::builtin().unwrap();
        let cluster = cluster("orders");
        let backup = MySQLBackupInstance::new(
            "nightly-42",
            BackupInstanceSpec {
                schedule: "nightly".to_string(),
                cluster: "orders".to_string(),
            },
        );

        let ctx = RenderContext::new(&cluster).with_backup(Some(&backup));
        let sts = renderer.render_stateful_set(&ctx).unwrap();

        let pod = sts.spec.unwrap().template.spec.unwrap();
        let init = pod.init_containers.unwrap();
        assert_eq!(init[0].name, "restore-backup");
        assert!(init[0].command.as_ref().unwrap()[2].contains("/backup/nightly-42/"));

        let volumes = pod.volumes.unwrap();
        assert_eq!(
            volumes[0]
                .persistent_volume_claim
                .as_ref()
                .map(|c| c.claim_name.as_str()),
            Some("nightly")
        );
    }

    #[test]
    fn test_every_object_is_owned_by_its_cluster() {
        let renderer = TemplateRenderer::builtin().unwrap();
        let mut cluster = cluster("orders");
        cluster.metadata.uid = Some("uid-1".to_string());
        let ctx = RenderContext::new(&cluster);

        let owners = [
            renderer.render_service(TemplateId::Service, &ctx).unwrap().metadata,
            renderer.render_service(TemplateId::ReadService, &ctx).unwrap().metadata,
            renderer.render_stateful_set(&ctx).unwrap().metadata,
        ]
        .into_iter()
        .map(|meta| meta.owner_references.unwrap());

        for refs in owners {
            assert_eq!(refs.len(), 1);
            let owner = &refs[0];
            assert_eq!(owner.uid, "uid-1");
            assert_eq!(owner.name, "orders");
            assert_eq!(owner.kind, "MySQLCluster");
            assert_eq!(owner.api_version, "cr.mysqloperator.grtl.github.com/v1");
            assert_eq!(owner.controller, Some(true));
            assert_eq!(owner.block_owner_deletion, Some(true));
        }
    }

    #[test]
    fn test_unpersisted_cluster_has_no_owner_reference() {
        let renderer = TemplateRenderer::builtin().unwrap();
        let cluster = cluster("orders");

        let service = renderer
            .render_service(TemplateId::Service, &RenderContext::new(&cluster))
            .unwrap();
        assert!(service.metadata.owner_references.is_none());
    }

    #[test]
    fn test_missing_context_field_is_render_error() {
        let renderer = TemplateRenderer::builtin().unwrap();
        // Not defaulted, so spec.port is absent from the context
        let cluster = MySQLCluster::new(
            "orders",
            ClusterSpec {
                password: "root-secret".to_string(),
                ..Default::default()
            },
        );

        let err = renderer
            .render_service(TemplateId::Service, &RenderContext::new(&cluster))
            .unwrap_err();
        assert!(matches!(err, OperatorError::Render(_)));
    }

    #[test]
    fn test_malformed_template_rejected_at_construction() {
        let templates = TemplateSet::builtin().with_source(TemplateId::Service, "{% if %}");
        assert!(matches!(
            TemplateRenderer::new(templates),
            Err(OperatorError::Render(_))
        ));
    }
}
