use crate::signals::SignalSink;
use std::time::Duration;
use testlens_core::config::UpdateOn;
use testlens_core::{Document, Editor, NodeId};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    PendingRefresh,
}

/// Root-level nodes of the last accepted parse. Every invalidation bumps the
/// generation so parses started before it can be recognised as stale.
#[derive(Debug, Default)]
pub struct OutlineCache {
    roots: Vec<NodeId>,
    generation: u64,
}

impl OutlineCache {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn invalidate(&mut self) {
        self.roots.clear();
        self.generation += 1;
    }

    pub fn populate(&mut self, roots: Vec<NodeId>) {
        self.roots = roots;
    }
}

/// Decides when the outline goes stale and when the view must refresh.
///
/// Debounce timers are tokio tasks, so the on-type path must run inside a
/// runtime.
#[derive(Debug)]
pub struct ChangeScheduler {
    update_on: UpdateOn,
    delay: Duration,
    document: Option<Document>,
    cache: OutlineCache,
    pending: Option<JoinHandle<()>>,
    signals: SignalSink,
}

impl ChangeScheduler {
    pub fn new(update_on: UpdateOn, delay: Duration, signals: SignalSink) -> Self {
        Self {
            update_on,
            delay,
            document: None,
            cache: OutlineCache::default(),
            pending: None,
            signals,
        }
    }

    pub fn configure(&mut self, update_on: UpdateOn, delay: Duration) {
        self.update_on = update_on;
        self.delay = delay;
    }

    pub fn state(&self) -> SchedulerState {
        match &self.pending {
            Some(handle) if !handle.is_finished() => SchedulerState::PendingRefresh,
            _ => SchedulerState::Idle,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn cache(&self) -> &OutlineCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut OutlineCache {
        &mut self.cache
    }

    fn tracks(&self, document: &Document) -> bool {
        self.document
            .as_ref()
            .is_some_and(|tracked| tracked.is_same(document))
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Returns false when the event was ignored.
    pub fn on_active_editor_changed(&mut self, editor: Option<&Editor>) -> bool {
        if let Some(editor) = editor {
            if !editor.is_primary() {
                debug!(event = "editor_change_ignored", uri = %editor.document.uri);
                return false;
            }
        }
        self.document = editor.map(|editor| editor.document.clone());
        self.cache.invalidate();
        self.cancel_pending();
        self.signals.tree_changed();
        true
    }

    pub fn on_document_changed(&mut self, document: &Document, content_changes: usize) -> bool {
        if content_changes == 0 || !self.tracks(document) {
            return false;
        }
        self.document = Some(document.clone());
        self.cache.invalidate();
        if self.update_on == UpdateOn::OnType {
            self.cancel_pending();
            let delay = self.delay;
            let signals = self.signals.clone();
            self.pending = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                signals.tree_changed();
            }));
        }
        true
    }

    pub fn on_document_saved(&mut self, document: &Document) -> bool {
        if self.update_on != UpdateOn::OnSave || !self.tracks(document) {
            return false;
        }
        self.document = Some(document.clone());
        self.cache.invalidate();
        self.signals.tree_changed();
        true
    }
}

impl Drop for ChangeScheduler {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
