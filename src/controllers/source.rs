//! Notification source
//!
//! Adapts the kube-rs watcher stream of MySQLCluster objects into
//! Added/Modified/Deleted notifications. A watcher only reports "this object
//! now looks like this", so the tracker remembers what it has seen to tell a
//! new cluster from a changed one, and to notice clusters that vanished while
//! the watch was being re-listed.

use super::dispatcher::Notification;
use crate::crd::MySQLCluster;
use futures::{stream, Stream, StreamExt};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::{watcher, WatchStreamExt};
use kube::Api;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Turns watcher events into notifications
#[derive(Default)]
pub struct NotificationTracker {
    known: HashMap<ObjectRef<MySQLCluster>, MySQLCluster>,
    relisted: Option<HashSet<ObjectRef<MySQLCluster>>>,
}

impl NotificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications implied by one watcher event
    pub fn observe(&mut self, event: watcher::Event<MySQLCluster>) -> Vec<Notification> {
        match event {
            watcher::Event::Apply(cluster) => self.apply(cluster),
            watcher::Event::Delete(cluster) => {
                self.known.remove(&ObjectRef::from_obj(&cluster));
                vec![Notification::deleted(cluster)]
            }
            watcher::Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(cluster) => {
                if let Some(seen) = self.relisted.as_mut() {
                    seen.insert(ObjectRef::from_obj(&cluster));
                }
                self.apply(cluster)
            }
            watcher::Event::InitDone => {
                let Some(seen) = self.relisted.take() else {
                    return Vec::new();
                };
                let gone: Vec<_> = self
                    .known
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                gone.iter()
                    .filter_map(|key| self.known.remove(key))
                    .map(Notification::deleted)
                    .collect()
            }
        }
    }

    /// Status writes do not bump `metadata.generation`, so only spec changes
    /// produce a Modified notification. A different uid under a known key is a
    /// cluster deleted and recreated while the watch was down: the old one is
    /// torn down before the new one is added.
    fn apply(&mut self, cluster: MySQLCluster) -> Vec<Notification> {
        let key = ObjectRef::from_obj(&cluster);
        match self.known.insert(key, cluster.clone()) {
            None => vec![Notification::added(cluster)],
            Some(previous) if previous.metadata.uid != cluster.metadata.uid => {
                vec![Notification::deleted(previous), Notification::added(cluster)]
            }
            Some(previous)
                if previous.metadata.generation != cluster.metadata.generation
                    || previous.spec != cluster.spec =>
            {
                vec![Notification::modified(cluster)]
            }
            Some(_) => Vec::new(),
        }
    }
}

/// Endless stream of notifications for the clusters visible through `api`.
///
/// Watch failures are logged; the watcher backs off and resumes on its own.
pub fn cluster_notifications(api: Api<MySQLCluster>) -> impl Stream<Item = Notification> {
    let mut tracker = NotificationTracker::new();
    watcher(api, watcher::Config::default())
        .default_backoff()
        .filter_map(|event| async move {
            match event {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, "MySQLCluster watch failed, resuming");
                    None
                }
            }
        })
        .flat_map(move |event| stream::iter(tracker.observe(event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::NotificationKind;
    use crate::crd::ClusterSpec;
    use kube::ResourceExt;

    fn cluster(name: &str, generation: i64) -> MySQLCluster {
        let mut cluster = MySQLCluster::new(
            name,
            ClusterSpec {
                password: "root-secret".to_string(),
                ..Default::default()
            },
        );
        cluster.metadata.namespace = Some("default".to_string());
        cluster.metadata.generation = Some(generation);
        cluster.metadata.uid = Some(format!("{}-uid", name));
        cluster
    }

    fn kinds(notifications: &[Notification]) -> Vec<(NotificationKind, String)> {
        notifications
            .iter()
            .map(|n| (n.kind, n.cluster.name_any()))
            .collect()
    }

    #[test]
    fn test_first_sighting_is_added() {
        let mut tracker = NotificationTracker::new();
        let out = tracker.observe(watcher::Event::Apply(cluster("orders", 1)));
        assert_eq!(kinds(&out), vec![(NotificationKind::Added, "orders".to_string())]);
    }

    #[test]
    fn test_status_only_change_is_ignored() {
        let mut tracker = NotificationTracker::new();
        tracker.observe(watcher::Event::Apply(cluster("orders", 1)));

        let mut with_status = cluster("orders", 1);
        with_status.status = Some(crate::status::build_status("Successful update", ""));
        assert!(tracker.observe(watcher::Event::Apply(with_status)).is_empty());
    }

    #[test]
    fn test_generation_change_is_modified() {
        let mut tracker = NotificationTracker::new();
        tracker.observe(watcher::Event::Apply(cluster("orders", 1)));

        let out = tracker.observe(watcher::Event::Apply(cluster("orders", 2)));
        assert_eq!(kinds(&out), vec![(NotificationKind::Modified, "orders".to_string())]);
    }

    #[test]
    fn test_delete_forgets_cluster() {
        let mut tracker = NotificationTracker::new();
        tracker.observe(watcher::Event::Apply(cluster("orders", 1)));

        let out = tracker.observe(watcher::Event::Delete(cluster("orders", 1)));
        assert_eq!(kinds(&out), vec![(NotificationKind::Deleted, "orders".to_string())]);

        let out = tracker.observe(watcher::Event::Apply(cluster("orders", 1)));
        assert_eq!(kinds(&out), vec![(NotificationKind::Added, "orders".to_string())]);
    }

    #[test]
    fn test_recreated_cluster_is_deleted_then_added() {
        let mut tracker = NotificationTracker::new();
        tracker.observe(watcher::Event::Apply(cluster("orders", 1)));

        let mut recreated = cluster("orders", 1);
        recreated.metadata.uid = Some("orders-uid-2".to_string());
        let out = tracker.observe(watcher::Event::Apply(recreated));

        assert_eq!(
            kinds(&out),
            vec![
                (NotificationKind::Deleted, "orders".to_string()),
                (NotificationKind::Added, "orders".to_string()),
            ]
        );
        assert_eq!(out[0].cluster.metadata.uid.as_deref(), Some("orders-uid"));
        assert_eq!(out[1].cluster.metadata.uid.as_deref(), Some("orders-uid-2"));
    }

    #[test]
    fn test_relist_reports_vanished_clusters() {
        let mut tracker = NotificationTracker::new();
        tracker.observe(watcher::Event::Apply(cluster("orders", 1)));
        tracker.observe(watcher::Event::Apply(cluster("billing", 3)));

        assert!(tracker.observe(watcher::Event::Init).is_empty());
        assert!(tracker
            .observe(watcher::Event::InitApply(cluster("billing", 3)))
            .is_empty());
        let out = tracker.observe(watcher::Event::InitDone);

        assert_eq!(kinds(&out), vec![(NotificationKind::Deleted, "orders".to_string())]);
    }

    #[test]
    fn test_initial_list_adds_every_cluster() {
        let mut tracker = NotificationTracker::new();
        tracker.observe(watcher::Event::Init);
        let first = tracker.observe(watcher::Event::InitApply(cluster("orders", 1)));
        let second = tracker.observe(watcher::Event::InitApply(cluster("billing", 1)));
        let done = tracker.observe(watcher::Event::InitDone);

        assert_eq!(first[0].kind, NotificationKind::Added);
        assert_eq!(second[0].kind, NotificationKind::Added);
        assert!(done.is_empty());
    }
}
