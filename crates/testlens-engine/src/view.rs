use crate::click::{ClickDisambiguator, ClickIntent};
use crate::discovery::DiscoveryIndex;
use crate::host::{EditorHost, OutlineParser};
use crate::reconcile::{ReconcileReport, ReconciliationEngine};
use crate::scheduler::{ChangeScheduler, OutlineCache, SchedulerState};
use crate::signals::SignalSink;
use std::time::Instant;
use testlens_core::config::{ViewConfig, ViewConfigPatch};
use testlens_core::host_ipc::NotificationAction;
use testlens_core::outline::{Outline, ParseError};
use testlens_core::presentation::NodePresentation;
use testlens_core::{Document, Editor, Node, NodeId, TestResult, TestTree};
use tracing::{debug, info, warn};

const PARSE_ERROR_ACTIONS: [NotificationAction; 2] =
    [NotificationAction::ShowLog, NotificationAction::Retry];

/// Permission to run one parse for the document that was current when the
/// read started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTicket {
    generation: u64,
    document: Document,
}

impl ParseTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Ready(Vec<NodeId>),
    NoData,
    NeedsParse(ParseTicket),
}

/// Single entry point for host events and tree reads.
///
/// Owns the discovered set, the outline cache, the debounce timer and the
/// click state. Nothing here is shared; callers serialize access.
#[derive(Debug)]
pub struct TestTreeView<H> {
    config: ViewConfig,
    scheduler: ChangeScheduler,
    engine: ReconciliationEngine,
    clicks: ClickDisambiguator,
    signals: SignalSink,
    host: H,
}

impl<H: EditorHost> TestTreeView<H> {
    pub fn new(config: ViewConfig, host: H, signals: SignalSink) -> Self {
        let scheduler =
            ChangeScheduler::new(config.update_on, config.debounce_delay(), signals.clone());
        let clicks = ClickDisambiguator::new(config.double_click_window());
        Self {
            scheduler,
            engine: ReconciliationEngine::new(signals.clone()),
            clicks,
            signals,
            host,
            config,
        }
    }

    pub fn configure(&mut self, patch: ViewConfigPatch) {
        self.config.apply(patch);
        self.scheduler
            .configure(self.config.update_on, self.config.debounce_delay());
        self.clicks.set_threshold(self.config.double_click_window());
        info!(
            event = "view_configured",
            update_on = %self.config.update_on,
            delay_ms = self.config.debounce_delay().as_millis() as u64,
            double_click_ms = self.config.double_click_window().as_millis() as u64
        );
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn on_active_editor_changed(&mut self, editor: Option<&Editor>) -> bool {
        self.scheduler.on_active_editor_changed(editor)
    }

    pub fn on_document_changed(&mut self, document: &Document, content_changes: usize) -> bool {
        self.scheduler.on_document_changed(document, content_changes)
    }

    pub fn on_document_saved(&mut self, document: &Document) -> bool {
        self.scheduler.on_document_saved(document)
    }

    /// Adopts a discovered set pushed by the host. Any parse still in flight
    /// becomes stale.
    pub fn on_discovered(&mut self, tree: TestTree) {
        let roots = top_level(&tree);
        self.engine.on_discovered(tree);
        let cache = self.scheduler.cache_mut();
        cache.invalidate();
        cache.populate(roots);
        self.signals.tree_changed();
    }

    pub fn on_test_run_started(&mut self, id: NodeId) -> bool {
        self.engine.on_test_run_started(id)
    }

    pub fn prepare_run(&mut self, id: NodeId) -> usize {
        self.engine.prepare_run(id)
    }

    pub fn on_test_results(&mut self, results: &[TestResult]) -> ReconcileReport {
        self.engine.on_test_results(results)
    }

    /// First half of a read. `None` asks for the root level.
    pub fn begin_read(&self, parent: Option<NodeId>) -> ReadOutcome {
        if let Some(parent) = parent {
            return match self.engine.index().node(parent) {
                Some(node) => ReadOutcome::Ready(node.nodes.clone()),
                None => {
                    debug!(event = "read_stale_parent", node = %parent);
                    ReadOutcome::NoData
                }
            };
        }

        let cache = self.scheduler.cache();
        if !cache.is_empty() {
            return ReadOutcome::Ready(cache.roots().to_vec());
        }
        let Some(document) = self.scheduler.document() else {
            return ReadOutcome::NoData;
        };
        if !self.config.supports_language(&document.language_id) {
            info!(
                event = "unsupported_document",
                uri = %document.uri,
                language = %document.language_id
            );
            return ReadOutcome::NoData;
        }
        ReadOutcome::NeedsParse(ParseTicket {
            generation: cache.generation(),
            document: document.clone(),
        })
    }

    /// Second half of a read. Results for an outdated ticket are dropped,
    /// errors included.
    pub fn complete_read(
        &mut self,
        ticket: ParseTicket,
        result: Result<Outline, ParseError>,
    ) -> Option<Vec<NodeId>> {
        let current = self.scheduler.cache().generation();
        if ticket.generation != current {
            debug!(
                event = "stale_parse_discarded",
                uri = %ticket.document.uri,
                ticket = ticket.generation,
                current
            );
            return None;
        }

        match result {
            Ok(outline) => {
                let tree = TestTree::from_outline(&outline);
                let roots = top_level(&tree);
                info!(
                    event = "outline_parsed",
                    uri = %ticket.document.uri,
                    nodes = tree.len().saturating_sub(1)
                );
                self.engine.on_discovered(tree);
                self.scheduler.cache_mut().populate(roots.clone());
                Some(roots)
            }
            Err(err) => {
                warn!(
                    event = "outline_parse_failed",
                    uri = %ticket.document.uri,
                    error = %err
                );
                let message = format!("Failed to parse tests in {}: {err}", ticket.document.uri);
                self.host.show_error(&message, &PARSE_ERROR_ACTIONS);
                None
            }
        }
    }

    pub async fn get_children<P: OutlineParser>(
        &mut self,
        parser: &P,
        parent: Option<NodeId>,
    ) -> Option<Vec<NodeId>> {
        match self.begin_read(parent) {
            ReadOutcome::Ready(children) => Some(children),
            ReadOutcome::NoData => None,
            ReadOutcome::NeedsParse(ticket) => {
                let result = parser.outline_from_doc(ticket.document()).await;
                self.complete_read(ticket, result)
            }
        }
    }

    /// Handles the click command. `None` when the node is no longer live.
    pub fn click(&mut self, id: NodeId, now: Instant) -> Option<ClickIntent> {
        let span = self.engine.index().node(id)?.span();
        let intent = self.clicks.on_click(span, now);
        match intent {
            ClickIntent::Single(span) => self.host.highlight(span),
            ClickIntent::Double(span) => {
                self.host.select(span.start);
                self.host.clear_highlight();
                self.host.focus_primary_editor();
            }
        }
        Some(intent)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.engine.index().node(id)
    }

    pub fn node_by_key(&self, key: &str) -> Option<&Node> {
        self.engine.index().get(key)
    }

    pub fn id_of(&self, key: &str) -> Option<NodeId> {
        self.engine.index().id_of(key)
    }

    pub fn presentation(&self, id: NodeId) -> Option<NodePresentation> {
        self.node(id).map(Node::presentation)
    }

    pub fn index(&self) -> &DiscoveryIndex {
        self.engine.index()
    }

    pub fn cache(&self) -> &OutlineCache {
        self.scheduler.cache()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn document(&self) -> Option<&Document> {
        self.scheduler.document()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}

fn top_level(tree: &TestTree) -> Vec<NodeId> {
    match tree.iter().find(|node| node.is_root()) {
        Some(root) => root.nodes.clone(),
        None => tree
            .iter()
            .filter(|node| node.parent.is_none())
            .map(|node| node.id)
            .collect(),
    }
}
