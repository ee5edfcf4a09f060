//! Custom resource schema registration
//!
//! The operator installs its own CRDs on startup with server-side apply, so
//! the schemas always match the operator version. Applying an unchanged CRD is
//! a no-op, which makes registration safe to repeat.

use crate::crd::{MySQLBackupInstance, MySQLCluster};
use crate::error::{OperatorError, Result};
use crate::platform::with_deadline;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt, ResourceExt};
use std::future::Future;
use std::time::Duration;
use tracing::info;

const FIELD_MANAGER: &str = "mysql-operator";

/// Definitions of every custom resource the operator owns
pub fn definitions() -> Vec<CustomResourceDefinition> {
    vec![MySQLCluster::crd(), MySQLBackupInstance::crd()]
}

/// All definitions as a multi-document YAML stream
pub fn definitions_yaml() -> Result<String> {
    let mut out = String::new();
    for crd in definitions() {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(&crd).map_err(|e| {
            OperatorError::Serialization(format!("failed to serialize CRD: {}", e))
        })?);
    }
    Ok(out)
}

/// Install or update the CRDs. Each apply is bounded by `timeout`.
pub async fn register_schemas(client: &Client, timeout: Duration) -> Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    install_definitions(timeout, |crd| {
        let crds = crds.clone();
        let params = params.clone();
        async move {
            let name = crd.name_any();
            crds.patch(&name, &params, &Patch::Apply(&crd)).await
        }
    })
    .await?;

    info!("All MySQL operator CRDs installed/updated");
    Ok(())
}

async fn install_definitions<F, Fut>(timeout: Duration, mut apply: F) -> Result<()>
where
    F: FnMut(CustomResourceDefinition) -> Fut,
    Fut: Future<Output = std::result::Result<CustomResourceDefinition, kube::Error>>,
{
    for crd in definitions() {
        let name = crd.name_any();
        info!(crd = %name, "Installing CRD");
        with_deadline(timeout, &format!("install CRD {}", name), apply(crd)).await?;
    }
    Ok(())
}
