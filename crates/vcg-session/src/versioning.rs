//! Immutable named versions
//!
//! Versions are only created by an explicit [`VersioningService::save`];
//! restoring one replaces the editor graph without creating a new version.

use crate::error::{PersistenceError, VersioningError};
use crate::persistence::Persistence;
use crate::types::{DocumentId, UserId, Version, VersionId, VersionMeta};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use vcg_graph::{Graph, GraphDiff, GraphStore};

/// Attempts before a sequence conflict is reported
const SAVE_ATTEMPTS: usize = 3;

/// Version list and sequence counter for one document
///
/// # Invariants
/// - sequence numbers strictly increase and are never reused
/// - exactly one version is current once any exists
pub struct VersioningService {
    document: DocumentId,
    author: Option<UserId>,
    persistence: Arc<dyn Persistence>,
    /// Ascending by sequence number
    versions: Vec<VersionMeta>,
    snapshots: HashMap<VersionId, Graph>,
    next_sequence: u64,
}

impl VersioningService {
    /// Seed from the versions already stored for `document`
    ///
    /// # Errors
    /// - `VersioningError::Persistence` if listing fails
    pub async fn open(
        document: DocumentId,
        author: Option<UserId>,
        persistence: Arc<dyn Persistence>,
    ) -> Result<Self, VersioningError> {
        let mut versions = persistence.list_versions(&document).await?;
        versions.sort_by_key(|v| v.sequence_number);
        let next_sequence = versions.last().map_or(1, |v| v.sequence_number + 1);

        tracing::debug!(document = %document, versions = versions.len(), next_sequence, "versioning opened");

        Ok(Self {
            document,
            author,
            persistence,
            versions,
            snapshots: HashMap::new(),
            next_sequence,
        })
    }

    #[inline]
    #[must_use]
    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    /// Sequence number the next save will get
    #[inline]
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Create a version of `graph`
    ///
    /// Never skipped, even if `graph` equals the current version. Defaults
    /// the name to `"Version <n>"`. The sequence number comes from the
    /// stored versions, so services for the same document never hand out
    /// the same one; a save that loses the race is retried with the next
    /// free number.
    ///
    /// # Errors
    /// - `VersioningError::Persistence` if listing or storing fails; no
    ///   version is added and the counter does not advance
    pub async fn save(&mut self, graph: &Graph, name: Option<&str>) -> Result<Version, VersioningError> {
        let mut attempt = 1;
        loop {
            self.refresh().await?;
            let version = self.build(graph, name);

            match self.persistence.save_version(&self.document, &version).await {
                Ok(()) => {
                    self.record(&version);
                    tracing::info!(
                        document = %self.document,
                        version = %version.id,
                        sequence = version.sequence_number,
                        name = %version.name,
                        "version saved"
                    );
                    return Ok(version);
                }
                Err(PersistenceError::Conflict(reason)) if attempt < SAVE_ATTEMPTS => {
                    tracing::debug!(
                        document = %self.document,
                        sequence = version.sequence_number,
                        attempt,
                        %reason,
                        "version sequence taken, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reload version metadata from persistence
    ///
    /// Picks up versions saved by other sessions on the same document.
    ///
    /// # Errors
    /// - `VersioningError::Persistence` if listing fails
    pub async fn refresh(&mut self) -> Result<(), VersioningError> {
        let mut stored = self.persistence.list_versions(&self.document).await?;
        stored.sort_by_key(|v| v.sequence_number);
        if let Some(last) = stored.last() {
            self.next_sequence = self.next_sequence.max(last.sequence_number + 1);
        }
        self.versions = stored;
        Ok(())
    }

    fn build(&self, graph: &Graph, name: Option<&str>) -> Version {
        let sequence_number = self.next_sequence;
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| format!("Version {sequence_number}"), str::to_string);

        Version {
            id: VersionId::generate(),
            sequence_number,
            snapshot: graph.clone(),
            name,
            author_id: self.author.clone(),
            created_at: Utc::now(),
            is_current: true,
        }
    }

    fn record(&mut self, version: &Version) {
        for meta in &mut self.versions {
            meta.is_current = false;
        }
        self.versions.push(version.meta());
        self.snapshots
            .insert(version.id.clone(), version.snapshot.clone());
        self.next_sequence = version.sequence_number + 1;
    }

    /// All versions, newest first
    #[must_use]
    pub fn list(&self) -> Vec<VersionMeta> {
        self.versions.iter().rev().cloned().collect()
    }

    #[must_use]
    pub fn current(&self) -> Option<&VersionMeta> {
        self.versions.iter().rev().find(|v| v.is_current)
    }

    /// Latest version carrying `name`
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&VersionMeta> {
        self.versions.iter().rev().find(|v| v.name == name)
    }

    #[must_use]
    pub fn get(&self, id: &VersionId) -> Option<&VersionMeta> {
        self.versions.iter().find(|v| &v.id == id)
    }

    /// Snapshot of a version
    ///
    /// # Errors
    /// - `VersioningError::UnknownVersion` if `id` is not a version of this document
    /// - `VersioningError::Persistence` if loading fails
    pub async fn load(&mut self, id: &VersionId) -> Result<Graph, VersioningError> {
        if self.get(id).is_none() {
            // may have been saved by another session
            self.refresh().await?;
            if self.get(id).is_none() {
                return Err(VersioningError::UnknownVersion(id.clone()));
            }
        }
        if let Some(graph) = self.snapshots.get(id) {
            return Ok(graph.clone());
        }
        let graph = self.persistence.load_version(id).await?;
        self.snapshots.insert(id.clone(), graph.clone());
        Ok(graph)
    }

    /// Replace the store content with a version's snapshot
    ///
    /// Creates no version and leaves the counter alone. Returns the restored
    /// graph; the store is untouched on error.
    ///
    /// # Errors
    /// See [`VersioningService::load`]
    pub async fn restore(&mut self, id: &VersionId, store: &mut GraphStore) -> Result<Graph, VersioningError> {
        let graph = self.load(id).await?;
        store.replace(graph.clone());
        tracing::info!(document = %self.document, version = %id, "version restored");
        Ok(graph)
    }

    /// Difference from version `a` to version `b`
    ///
    /// # Errors
    /// See [`VersioningService::load`]
    pub async fn diff(&mut self, a: &VersionId, b: &VersionId) -> Result<GraphDiff, VersioningError> {
        let from = self.load(a).await?;
        let to = self.load(b).await?;
        Ok(GraphDiff::between(&from, &to))
    }
}

impl std::fmt::Debug for VersioningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersioningService")
            .field("document", &self.document)
            .field("versions", &self.versions.len())
            .field("next_sequence", &self.next_sequence)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryPersistence, MockPersistence};
    use vcg_graph::{Node, NodeKind, NodeField};

    fn graph(label: &str) -> Graph {
        Graph::from_parts([Node::new("n1", NodeKind::Primary, label)], [])
    }

    async fn service(persistence: Arc<dyn Persistence>) -> VersioningService {
        VersioningService::open("doc".into(), Some("alice".into()), persistence)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn save_assigns_sequence_and_flips_current() {
        let mut versions = service(Arc::new(MemoryPersistence::new())).await;

        let v1 = versions.save(&graph("a"), None).await.unwrap();
        let v2 = versions.save(&graph("a"), Some("Baseline")).await.unwrap();

        assert_eq!(v1.sequence_number, 1);
        assert_eq!(v1.name, "Version 1");
        assert_eq!(v2.sequence_number, 2);
        assert_eq!(v2.author_id, Some(UserId::from("alice")));

        let list = versions.list();
        assert_eq!(list[0].id, v2.id);
        assert!(list[0].is_current);
        assert!(!list[1].is_current);
        assert_eq!(versions.current().map(|v| v.id.clone()), Some(v2.id));
        assert_eq!(versions.find_by_name("Baseline").map(|v| v.sequence_number), Some(2));
    }

    #[tokio::test]
    async fn failed_save_changes_nothing() {
        let mut mock = MockPersistence::new();
        mock.expect_list_versions().returning(|_| Ok(Vec::new()));
        mock.expect_save_version()
            .returning(|_, _| Err(PersistenceError::Unavailable("offline".into())));
        let mut versions = service(Arc::new(mock)).await;

        let err = versions.save(&graph("a"), None).await.unwrap_err();
        assert!(matches!(err, VersioningError::Persistence(PersistenceError::Unavailable(_))));
        assert!(versions.list().is_empty());
        assert_eq!(versions.next_sequence(), 1);
    }

    #[tokio::test]
    async fn conflicting_sequence_is_retried_with_next_number() {
        let mut mock = MockPersistence::new();
        let mut listed = 0;
        mock.expect_list_versions().returning(move |_| {
            listed += 1;
            // a second session stores version 1 right after our first attempt lists
            let taken = if listed > 2 { vec![other_version(1)] } else { Vec::new() };
            Ok(taken)
        });
        let mut seq = mockall::Sequence::new();
        mock.expect_save_version()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, v| v.sequence_number == 1)
            .returning(|_, _| Err(PersistenceError::Conflict("sequence 1".into())));
        mock.expect_save_version()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|_, v| v.sequence_number == 2)
            .returning(|_, _| Ok(()));
        let mut versions = service(Arc::new(mock)).await;

        let saved = versions.save(&graph("a"), None).await.unwrap();
        assert_eq!(saved.sequence_number, 2);
        assert_eq!(saved.name, "Version 2");
        let list = versions.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().filter(|v| v.is_current).count(), 1);
        assert_eq!(versions.next_sequence(), 3);
    }

    #[tokio::test]
    async fn persistent_conflict_gives_up() {
        let mut mock = MockPersistence::new();
        mock.expect_list_versions().returning(|_| Ok(Vec::new()));
        mock.expect_save_version()
            .times(SAVE_ATTEMPTS)
            .returning(|_, _| Err(PersistenceError::Conflict("busy".into())));
        let mut versions = service(Arc::new(mock)).await;

        let err = versions.save(&graph("a"), None).await.unwrap_err();
        assert!(matches!(err, VersioningError::Persistence(PersistenceError::Conflict(_))));
        assert!(versions.list().is_empty());
    }

    fn other_version(sequence_number: u64) -> VersionMeta {
        VersionMeta {
            id: VersionId::from(format!("other-{sequence_number}")),
            sequence_number,
            name: format!("Version {sequence_number}"),
            author_id: Some("bob".into()),
            created_at: Utc::now(),
            is_current: true,
        }
    }

    #[tokio::test]
    async fn restore_replaces_store_without_new_version() {
        let mut versions = service(Arc::new(MemoryPersistence::new())).await;
        let v1 = versions.save(&graph("first"), None).await.unwrap();
        versions.save(&graph("second"), None).await.unwrap();

        let mut store = GraphStore::from_graph(graph("edited"));
        let restored = versions.restore(&v1.id, &mut store).await.unwrap();

        assert_eq!(store.graph(), &restored);
        assert_eq!(store.node("n1").unwrap().label(), "first");
        assert_eq!(versions.list().len(), 2);

        let v3 = versions.save(store.graph(), None).await.unwrap();
        assert_eq!(v3.sequence_number, 3);
    }

    #[tokio::test]
    async fn reopen_continues_sequence_and_loads_from_persistence() {
        let persistence: Arc<dyn Persistence> = Arc::new(MemoryPersistence::new());
        let latest = {
            let mut versions = service(Arc::clone(&persistence)).await;
            versions.save(&graph("a"), None).await.unwrap();
            versions.save(&graph("b"), None).await.unwrap()
        };

        let mut reopened = service(persistence).await;
        assert_eq!(reopened.next_sequence(), 3);
        assert_eq!(reopened.current().map(|v| v.id.clone()), Some(latest.id.clone()));
        assert_eq!(reopened.load(&latest.id).await.unwrap(), graph("b"));
    }

    #[tokio::test]
    async fn unknown_version_is_rejected() {
        let mut versions = service(Arc::new(MemoryPersistence::new())).await;
        let mut store = GraphStore::from_graph(graph("keep"));
        let err = versions
            .restore(&VersionId::from("missing"), &mut store)
            .await
            .unwrap_err();
        assert!(matches!(err, VersioningError::UnknownVersion(_)));
        assert_eq!(store.node("n1").unwrap().label(), "keep");
    }

    #[tokio::test]
    async fn diff_between_versions() {
        let mut versions = service(Arc::new(MemoryPersistence::new())).await;
        let a = versions.save(&graph("old"), None).await.unwrap();
        let b = versions.save(&graph("new"), None).await.unwrap();

        let diff = versions.diff(&a.id, &b.id).await.unwrap();
        assert_eq!(diff.modified_nodes.len(), 1);
        assert_eq!(diff.modified_nodes[0].fields, vec![NodeField::Label]);
        assert!(diff.added_nodes.is_empty());
    }
}
