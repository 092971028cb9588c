//! Debounced, fingerprinted auto-save
//!
//! [`AutoSavePipeline::notify_change`] (re)arms a single debounce timer.
//! When the timer fires, the snapshot is fingerprinted and persisted unless
//! it matches the last successful save.
//!
//! # Ordering
//! Every snapshot carries a generation number. Saves run one at a time and a
//! save older than the last recorded one is discarded, so a slow save of an
//! old snapshot can never overwrite the fingerprint of a newer one.

use crate::error::PersistenceError;
use crate::events::{EventSender, SessionEvent};
use crate::persistence::Persistence;
use crate::types::DocumentId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use vcg_graph::{Fingerprint, Graph};

/// Outcome of one save attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(Fingerprint),
    /// Graph matched the last successful save
    Skipped,
    Failed(PersistenceError),
    /// Pipeline disposed or a newer snapshot was already saved
    Discarded,
}

/// Debounced auto-save for one document
pub struct AutoSavePipeline {
    inner: Arc<Inner>,
    debounce: Duration,
    timer: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    document: DocumentId,
    persistence: Arc<dyn Persistence>,
    events: EventSender,
    generation: AtomicU64,
    disposed: AtomicBool,
    /// Held for the whole duration of a save
    save_lock: tokio::sync::Mutex<u64>,
    last_saved: Mutex<Option<Fingerprint>>,
}

impl AutoSavePipeline {
    #[must_use]
    pub fn new(
        document: DocumentId,
        persistence: Arc<dyn Persistence>,
        debounce: Duration,
        events: EventSender,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                document,
                persistence,
                events,
                generation: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
                save_lock: tokio::sync::Mutex::new(0),
                last_saved: Mutex::new(None),
            }),
            debounce,
            timer: Mutex::new(None),
        }
    }

    /// Treat `graph` as already persisted (e.g. just loaded)
    pub fn set_baseline(&self, graph: &Graph) {
        match graph.fingerprint() {
            Ok(fp) => *self.inner.last_saved.lock() = Some(fp),
            Err(e) => tracing::warn!(error = %e, "could not fingerprint baseline graph"),
        }
    }

    #[inline]
    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Fingerprint of the last successful save
    #[must_use]
    pub fn last_saved(&self) -> Option<Fingerprint> {
        *self.inner.last_saved.lock()
    }

    /// Whether `graph` differs from the last successful save
    #[must_use]
    pub fn is_dirty(&self, graph: &Graph) -> bool {
        match graph.fingerprint() {
            Ok(fp) => self.last_saved() != Some(fp),
            Err(_) => true,
        }
    }

    /// Whether a debounce timer is armed
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.timer
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Record a local change and restart the debounce window
    ///
    /// Only the snapshot from the last call in a window is saved. Outside a
    /// Tokio runtime nothing is scheduled; the change stays dirty until the
    /// next call from inside one, or an explicit flush.
    pub fn notify_change(&self, graph: Graph) {
        if self.is_disposed() {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(document = %self.inner.document, "no async runtime; auto-save not scheduled");
            return;
        };
        let generation = self.inner.next_generation();
        let inner = Arc::clone(&self.inner);
        let debounce = self.debounce;

        let timer = runtime.spawn(async move {
            tokio::time::sleep(debounce).await;
            // Detached so that re-arming the timer never cancels a running save
            tokio::spawn(async move {
                inner.save(graph, generation).await;
            });
        });

        if let Some(previous) = self.timer.lock().replace(timer) {
            previous.abort();
        }
        tracing::debug!(document = %self.inner.document, generation, "auto-save scheduled");
    }

    /// Cancel the timer and save `graph` now
    pub async fn flush(&self, graph: Graph) -> SaveOutcome {
        self.cancel_timer();
        if self.is_disposed() {
            return SaveOutcome::Discarded;
        }
        let generation = self.inner.next_generation();
        self.inner.save(graph, generation).await
    }

    /// Stop the pipeline
    ///
    /// The pending timer is cancelled; a save already running completes but
    /// its result is neither recorded nor reported.
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            self.cancel_timer();
            tracing::debug!(document = %self.inner.document, "auto-save disposed");
        }
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }
}

impl Drop for AutoSavePipeline {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

impl std::fmt::Debug for AutoSavePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoSavePipeline")
            .field("document", &self.inner.document)
            .field("debounce", &self.debounce)
            .field("last_saved", &self.last_saved())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn emit(&self, event: SessionEvent) {
        if !self.disposed() {
            // Receiver gone means the session is closing
            let _ = self.events.send(event);
        }
    }

    async fn save(&self, graph: Graph, generation: u64) -> SaveOutcome {
        let mut recorded_generation = self.save_lock.lock().await;
        if self.disposed() || generation < *recorded_generation {
            return SaveOutcome::Discarded;
        }

        let fingerprint = match graph.fingerprint() {
            Ok(fp) => fp,
            Err(e) => {
                let error = PersistenceError::Backend(e.to_string());
                tracing::warn!(document = %self.document, error = %error, "auto-save failed");
                self.emit(SessionEvent::AutoSaveFailed(error.clone()));
                return SaveOutcome::Failed(error);
            }
        };

        if *self.last_saved.lock() == Some(fingerprint) {
            tracing::debug!(document = %self.document, fingerprint = %fingerprint.short(), "auto-save skipped, unchanged");
            self.emit(SessionEvent::AutoSaveSkipped);
            return SaveOutcome::Skipped;
        }

        let result = self.persistence.save(&self.document, &graph).await;
        if self.disposed() {
            return SaveOutcome::Discarded;
        }

        match result {
            Ok(()) => {
                *recorded_generation = generation;
                *self.last_saved.lock() = Some(fingerprint);
                tracing::info!(document = %self.document, fingerprint = %fingerprint.short(), nodes = graph.node_count(), "auto-saved");
                self.emit(SessionEvent::AutoSaved(fingerprint));
                SaveOutcome::Saved(fingerprint)
            }
            Err(error) => {
                tracing::warn!(document = %self.document, error = %error, "auto-save failed");
                self.emit(SessionEvent::AutoSaveFailed(error.clone()));
                SaveOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_channel;
    use crate::persistence::MockPersistence;
    use std::sync::atomic::AtomicUsize;
    use vcg_graph::{Node, NodeKind};

    const DEBOUNCE: Duration = Duration::from_secs(10);

    fn graph(labels: &[&str]) -> Graph {
        Graph::from_parts(
            labels
                .iter()
                .map(|l| Node::new(*l, NodeKind::Primary, *l)),
            [],
        )
    }

    fn pipeline(mock: MockPersistence) -> (AutoSavePipeline, crate::events::EventReceiver) {
        let (tx, rx) = event_channel();
        let pipeline = AutoSavePipeline::new("doc".into(), Arc::new(mock), DEBOUNCE, tx);
        (pipeline, rx)
    }

    #[test]
    fn change_outside_runtime_is_not_scheduled() {
        let mut mock = MockPersistence::new();
        mock.expect_save().never();
        let (autosave, mut rx) = pipeline(mock);

        autosave.notify_change(graph(&["a"]));

        assert!(!autosave.is_pending());
        assert!(autosave.is_dirty(&graph(&["a"])));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_save_of_last_graph() {
        let mut mock = MockPersistence::new();
        mock.expect_save()
            .withf(|doc, g| doc.as_str() == "doc" && g.node_count() == 3)
            .times(1)
            .returning(|_, _| Ok(()));
        let (autosave, mut rx) = pipeline(mock);

        autosave.notify_change(graph(&["a"]));
        tokio::time::sleep(Duration::from_secs(3)).await;
        autosave.notify_change(graph(&["a", "b"]));
        tokio::time::sleep(Duration::from_secs(3)).await;
        autosave.notify_change(graph(&["a", "b", "c"]));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::AutoSaved(_)));
        assert!(!autosave.is_dirty(&graph(&["a", "b", "c"])));
        assert!(autosave.is_dirty(&graph(&["a"])));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_graph_is_saved_once() {
        let mut mock = MockPersistence::new();
        mock.expect_save().times(1).returning(|_, _| Ok(()));
        let (autosave, mut rx) = pipeline(mock);

        autosave.notify_change(graph(&["a"]));
        assert!(matches!(rx.recv().await, Some(SessionEvent::AutoSaved(_))));

        autosave.notify_change(graph(&["a"]));
        assert!(matches!(rx.recv().await, Some(SessionEvent::AutoSaveSkipped)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_is_retried_next_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut mock = MockPersistence::new();
        mock.expect_save().times(2).returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PersistenceError::Unavailable("offline".into()))
            } else {
                Ok(())
            }
        });
        let (autosave, mut rx) = pipeline(mock);

        autosave.notify_change(graph(&["a"]));
        match rx.recv().await {
            Some(SessionEvent::AutoSaveFailed(PersistenceError::Unavailable(_))) => {}
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(autosave.last_saved().is_none());

        // Same content again: not skipped because nothing was recorded
        autosave.notify_change(graph(&["a"]));
        assert!(matches!(rx.recv().await, Some(SessionEvent::AutoSaved(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_pending_save() {
        let mut mock = MockPersistence::new();
        mock.expect_save().times(0);
        let (autosave, mut rx) = pipeline(mock);

        autosave.notify_change(graph(&["a"]));
        assert!(autosave.is_pending());
        autosave.dispose();
        tokio::time::sleep(DEBOUNCE * 3).await;

        assert!(rx.try_recv().is_err());
        autosave.notify_change(graph(&["b"]));
        assert!(!autosave.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_saves_immediately_and_cancels_timer() {
        let mut mock = MockPersistence::new();
        mock.expect_save().times(1).returning(|_, _| Ok(()));
        let (autosave, mut rx) = pipeline(mock);

        autosave.notify_change(graph(&["a"]));
        let outcome = autosave.flush(graph(&["a", "b"])).await;
        assert!(matches!(outcome, SaveOutcome::Saved(_)));
        assert!(matches!(rx.recv().await, Some(SessionEvent::AutoSaved(_))));

        tokio::time::sleep(DEBOUNCE * 2).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn baseline_suppresses_redundant_first_save() {
        let mut mock = MockPersistence::new();
        mock.expect_save().times(0);
        let (autosave, _rx) = pipeline(mock);

        autosave.set_baseline(&graph(&["a"]));
        assert_eq!(autosave.flush(graph(&["a"])).await, SaveOutcome::Skipped);
    }
}
