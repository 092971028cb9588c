//! Persistence collaborator
//!
//! [`Persistence`] is the storage seam of the session. [`MemoryPersistence`]
//! keeps everything in concurrent maps and is suitable for tests and
//! single-process deployments.

use crate::error::PersistenceError;
use crate::types::{DocumentId, Version, VersionId, VersionMeta};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use vcg_graph::Graph;

/// Document and version storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Store the current graph of a document (auto-save target)
    async fn save(&self, document: &DocumentId, graph: &Graph) -> Result<(), PersistenceError>;

    /// Latest auto-saved graph, `None` for a new document
    async fn load_current(&self, document: &DocumentId) -> Result<Option<Graph>, PersistenceError>;

    /// Store an immutable version
    ///
    /// Implementations must also mark every other version of the document
    /// as not current, and must fail with `PersistenceError::Conflict` when
    /// the sequence number is not above every one already stored for the
    /// document. The check and the write happen atomically.
    async fn save_version(
        &self,
        document: &DocumentId,
        version: &Version,
    ) -> Result<(), PersistenceError>;

    /// Version metadata for a document, any order
    async fn list_versions(&self, document: &DocumentId)
        -> Result<Vec<VersionMeta>, PersistenceError>;

    /// Snapshot of a stored version
    async fn load_version(&self, version: &VersionId) -> Result<Graph, PersistenceError>;
}

/// In-memory persistence
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    current: DashMap<DocumentId, Graph>,
    versions: DashMap<VersionId, (DocumentId, Version)>,
    /// Highest stored sequence number per document
    sequences: DashMap<DocumentId, u64>,
    saves: AtomicUsize,
}

impl MemoryPersistence {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current graph without going through the async trait
    #[must_use]
    pub fn current(&self, document: &DocumentId) -> Option<Graph> {
        self.current.get(document).map(|g| g.value().clone())
    }

    #[must_use]
    pub fn version_count(&self, document: &DocumentId) -> usize {
        self.versions
            .iter()
            .filter(|entry| &entry.value().0 == document)
            .count()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn save(&self, document: &DocumentId, graph: &Graph) -> Result<(), PersistenceError> {
        self.current.insert(document.clone(), graph.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(document = %document, nodes = graph.node_count(), "stored current graph");
        Ok(())
    }

    async fn load_current(&self, document: &DocumentId) -> Result<Option<Graph>, PersistenceError> {
        Ok(self.current(document))
    }

    async fn save_version(
        &self,
        document: &DocumentId,
        version: &Version,
    ) -> Result<(), PersistenceError> {
        // Shard lock on the document's entry serializes concurrent writers
        let mut highest = self.sequences.entry(document.clone()).or_insert(0);
        if version.sequence_number <= *highest {
            return Err(PersistenceError::Conflict(format!(
                "sequence {} already taken for {document} (highest {})",
                version.sequence_number, *highest
            )));
        }
        *highest = version.sequence_number;

        if version.is_current {
            for mut entry in self.versions.iter_mut() {
                let (owner, stored) = entry.value_mut();
                if owner == document {
                    stored.is_current = false;
                }
            }
        }
        self.versions
            .insert(version.id.clone(), (document.clone(), version.clone()));
        drop(highest);
        Ok(())
    }

    async fn list_versions(
        &self,
        document: &DocumentId,
    ) -> Result<Vec<VersionMeta>, PersistenceError> {
        Ok(self
            .versions
            .iter()
            .filter(|entry| &entry.value().0 == document)
            .map(|entry| entry.value().1.meta())
            .collect())
    }

    async fn load_version(&self, version: &VersionId) -> Result<Graph, PersistenceError> {
        self.versions
            .get(version)
            .map(|entry| entry.value().1.snapshot.clone())
            .ok_or_else(|| PersistenceError::NotFound(format!("version {version}")))
    }
}
