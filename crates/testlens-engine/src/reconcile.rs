use crate::discovery::DiscoveryIndex;
use crate::signals::SignalSink;
use std::collections::HashSet;
use testlens_core::{NodeId, TestResult, TestTree};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub settled: usize,
    pub dropped: usize,
    pub swept: usize,
}

/// Merges run lifecycle events into the current discovered set.
#[derive(Debug)]
pub struct ReconciliationEngine {
    index: DiscoveryIndex,
    signals: SignalSink,
}

impl ReconciliationEngine {
    pub fn new(signals: SignalSink) -> Self {
        Self {
            index: DiscoveryIndex::new(),
            signals,
        }
    }

    pub fn index(&self) -> &DiscoveryIndex {
        &self.index
    }

    pub fn on_discovered(&mut self, tree: TestTree) {
        self.index.on_discovered(tree);
    }

    /// Returns false when the node does not belong to the current set.
    pub fn on_test_run_started(&mut self, id: NodeId) -> bool {
        let Some(node) = self.index.node_mut(id) else {
            debug!(event = "run_started_stale_node", node = %id);
            return false;
        };
        node.running = true;
        self.signals.node_changed(id);
        true
    }

    /// Marks the node and its whole subtree as running.
    pub fn prepare_run(&mut self, id: NodeId) -> usize {
        let subtree = self.index.tree().subtree(id);
        let mut marked = 0;
        for node in subtree {
            if self.on_test_run_started(node) {
                marked += 1;
            }
        }
        debug!(event = "prepare_run", node = %id, marked);
        marked
    }

    pub fn on_test_results(&mut self, results: &[TestResult]) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut settled: HashSet<NodeId> = HashSet::new();

        for result in results {
            let Some(node) = self.index.get_mut(&result.test_name) else {
                report.dropped += 1;
                continue;
            };
            if !node.running {
                report.dropped += 1;
                continue;
            }
            node.running = false;
            node.result = Some(result.outcome());
            settled.insert(node.id);
            self.signals.node_changed(node.id);
            report.settled += 1;
        }

        for node in self.index.tree_mut().iter_mut() {
            if node.running && !settled.contains(&node.id) {
                node.running = false;
                self.signals.node_changed(node.id);
                report.swept += 1;
            }
        }

        debug!(
            event = "test_results_reconciled",
            settled = report.settled,
            dropped = report.dropped,
            swept = report.swept
        );
        report
    }
}
