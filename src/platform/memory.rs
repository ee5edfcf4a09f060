//! In-memory platform client
//!
//! Keeps objects in process, records every call, and lets callers inject a
//! failure for any (operation, kind, name) triple. Updates enforce resource
//! versions the way the API server does, so a stale or missing version fails
//! with [`OperatorError::VersionConflict`].

use super::{ObjectKind, PlatformClient};
use crate::crd::{ClusterStatus, MySQLBackupInstance, MySQLCluster};
use crate::error::{OperatorError, Result};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Operation performed against the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Get,
    Update,
    Delete,
}

/// One recorded platform call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    pub kind: ObjectKind,
    pub name: String,
}

impl Call {
    pub fn new(operation: Operation, kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            name: name.into(),
        }
    }
}

struct Fault {
    call: Call,
    error: OperatorError,
}

/// (namespace, name)
type ObjectKey = (String, String);

#[derive(Default)]
struct State {
    services: BTreeMap<ObjectKey, Service>,
    stateful_sets: BTreeMap<ObjectKey, StatefulSet>,
    backups: BTreeMap<ObjectKey, MySQLBackupInstance>,
    statuses: BTreeMap<ObjectKey, ClusterStatus>,
    faults: Vec<Fault>,
    calls: Vec<Call>,
    last_version: u64,
}

impl State {
    /// Record the call and return the injected failure for it, if any.
    fn enter(&mut self, call: Call) -> Result<()> {
        let injected = self
            .faults
            .iter()
            .find(|f| f.call == call)
            .map(|f| f.error.clone());
        self.calls.push(call);
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }
}

/// Platform client backed by in-process maps
#[derive(Default)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every matching call fail with `error` until faults are cleared.
    pub fn fail(&self, operation: Operation, kind: ObjectKind, name: &str, error: OperatorError) {
        self.lock().faults.push(Fault {
            call: Call::new(operation, kind, name),
            error,
        });
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Seed a backup instance
    pub fn insert_backup(&self, namespace: &str, backup: MySQLBackupInstance) {
        let key = (namespace.to_string(), backup.name_any());
        self.lock().backups.insert(key, backup);
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.lock()
            .services
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn stateful_set(&self, namespace: &str, name: &str) -> Option<StatefulSet> {
        self.lock()
            .stateful_sets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Last status written for a cluster
    pub fn status(&self, namespace: &str, name: &str) -> Option<ClusterStatus> {
        self.lock()
            .statuses
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of Services and StatefulSets currently stored
    pub fn object_count(&self) -> usize {
        let state = self.lock();
        state.services.len() + state.stateful_sets.len()
    }
}

fn create_in<K>(
    store: &mut BTreeMap<ObjectKey, K>,
    version: String,
    kind: ObjectKind,
    namespace: &str,
    obj: &K,
) -> Result<K>
where
    K: Resource + Clone,
{
    let key = (namespace.to_string(), obj.name_any());
    if store.contains_key(&key) {
        return Err(OperatorError::AlreadyExists(format!(
            "{} \"{}\" already exists",
            kind, key.1
        )));
    }

    let mut stored = obj.clone();
    stored.meta_mut().namespace = Some(namespace.to_string());
    stored.meta_mut().resource_version = Some(version);
    store.insert(key, stored.clone());
    Ok(stored)
}

fn get_in<K: Clone>(
    store: &BTreeMap<ObjectKey, K>,
    kind: ObjectKind,
    namespace: &str,
    name: &str,
) -> Result<K> {
    store
        .get(&(namespace.to_string(), name.to_string()))
        .cloned()
        .ok_or_else(|| OperatorError::NotFound(format!("{} \"{}\" not found", kind, name)))
}

fn update_in<K>(
    store: &mut BTreeMap<ObjectKey, K>,
    version: String,
    kind: ObjectKind,
    namespace: &str,
    obj: &K,
) -> Result<K>
where
    K: Resource + Clone,
{
    let key = (namespace.to_string(), obj.name_any());
    let current = store
        .get(&key)
        .ok_or_else(|| OperatorError::NotFound(format!("{} \"{}\" not found", kind, key.1)))?;

    if obj.meta().resource_version != current.meta().resource_version {
        return Err(OperatorError::VersionConflict(format!(
            "{} \"{}\": resource version {:?} does not match {:?}",
            kind,
            key.1,
            obj.meta().resource_version,
            current.meta().resource_version
        )));
    }

    let mut stored = obj.clone();
    stored.meta_mut().namespace = Some(namespace.to_string());
    stored.meta_mut().resource_version = Some(version);
    store.insert(key, stored.clone());
    Ok(stored)
}

fn delete_in<K>(
    store: &mut BTreeMap<ObjectKey, K>,
    kind: ObjectKind,
    namespace: &str,
    name: &str,
) -> Result<()> {
    store
        .remove(&(namespace.to_string(), name.to_string()))
        .map(|_| ())
        .ok_or_else(|| OperatorError::NotFound(format!("{} \"{}\" not found", kind, name)))
}

#[async_trait::async_trait]
impl PlatformClient for InMemoryPlatform {
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let mut state = self.lock();
        state.enter(Call::new(Operation::Create, ObjectKind::Service, service.name_any()))?;
        let version = state.next_version();
        create_in(&mut state.services, version, ObjectKind::Service, namespace, service)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Service> {
        let mut state = self.lock();
        state.enter(Call::new(Operation::Get, ObjectKind::Service, name))?;
        get_in(&state.services, ObjectKind::Service, namespace, name)
    }

    async fn update_service(&self, namespace: &str, service: &Service) -> Result<Service> {
        let mut state = self.lock();
        state.enter(Call::new(Operation::Update, ObjectKind::Service, service.name_any()))?;
        let version = state.next_version();
        update_in(&mut state.services, version, ObjectKind::Service, namespace, service)
    }

    async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.enter(Call::new(Operation::Delete, ObjectKind::Service, name))?;
        delete_in(&mut state.services, ObjectKind::Service, namespace, name)
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet> {
        let mut state = self.lock();
        state.enter(Call::new(Operation::Create, ObjectKind::StatefulSet, sts.name_any()))?;
        let version = state.next_version();
        create_in(&mut state.stateful_sets, version, ObjectKind::StatefulSet, namespace, sts)
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet> {
        let mut state = self.lock();
        state.enter(Call::new(Operation::Get, ObjectKind::StatefulSet, name))?;
        get_in(&state.stateful_sets, ObjectKind::StatefulSet, namespace, name)
    }

    async fn update_stateful_set(
        &self,
        namespace: &str,
        sts: &StatefulSet,
    ) -> Result<StatefulSet> {
        let mut state = self.lock();
        state.enter(Call::new(Operation::Update, ObjectKind::StatefulSet, sts.name_any()))?;
        let version = state.next_version();
        update_in(&mut state.stateful_sets, version, ObjectKind::StatefulSet, namespace, sts)
    }

    async fn delete_stateful_set(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.lock();
        state.enter(Call::new(Operation::Delete, ObjectKind::StatefulSet, name))?;
        delete_in(&mut state.stateful_sets, ObjectKind::StatefulSet, namespace, name)
    }

    async fn get_backup_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<MySQLBackupInstance> {
        let mut state = self.lock();
        state.enter(Call::new(Operation::Get, ObjectKind::BackupInstance, name))?;
        get_in(&state.backups, ObjectKind::BackupInstance, namespace, name)
    }

    async fn update_cluster_status(&self, cluster: &MySQLCluster) -> Result<()> {
        let name = cluster.name_any();
        let namespace = cluster.namespace().unwrap_or_else(|| "default".to_string());
        let mut state = self.lock();
        state.enter(Call::new(Operation::Update, ObjectKind::Cluster, name.clone()))?;
        state
            .statuses
            .insert((namespace, name), cluster.status.clone().unwrap_or_default());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn service(name: &str) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_twice_is_already_exists() {
        let platform = InMemoryPlatform::new();
        platform.create_service("default", &service("orders")).await.unwrap();

        let err = platform
            .create_service("default", &service("orders"))
            .await
            .unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(platform.object_count(), 1);
    }

    #[tokio::test]
    async fn test_update_requires_current_version() {
        let platform = InMemoryPlatform::new();
        let created = platform.create_service("default", &service("orders")).await.unwrap();

        let err = platform
            .update_service("default", &service("orders"))
            .await
            .unwrap_err();
        assert!(matches!(err, OperatorError::VersionConflict(_)));

        let updated = platform.update_service("default", &created).await.unwrap();
        assert_ne!(updated.metadata.resource_version, created.metadata.resource_version);
    }

    #[tokio::test]
    async fn test_injected_fault_is_recorded_and_returned() {
        let platform = InMemoryPlatform::new();
        platform.fail(
            Operation::Create,
            ObjectKind::Service,
            "orders-read",
            OperatorError::KubeApi("boom".to_string()),
        );

        platform.create_service("default", &service("orders")).await.unwrap();
        let err = platform
            .create_service("default", &service("orders-read"))
            .await
            .unwrap_err();

        assert_eq!(err, OperatorError::KubeApi("boom".to_string()));
        assert_eq!(platform.calls().len(), 2);
        assert!(platform.service("default", "orders-read").is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let platform = InMemoryPlatform::new();
        let err = platform.delete_stateful_set("default", "orders").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
