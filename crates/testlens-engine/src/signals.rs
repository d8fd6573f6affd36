use testlens_core::NodeId;
use tokio::sync::mpsc;
use tracing::debug;

/// Invalidation raised towards the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSignal {
    /// Everything below the root must be re-read.
    TreeChanged,
    /// Only this node needs a repaint.
    NodeChanged(NodeId),
}

#[derive(Debug, Clone)]
pub struct SignalSink {
    tx: mpsc::UnboundedSender<ViewSignal>,
}

pub fn signal_channel() -> (SignalSink, mpsc::UnboundedReceiver<ViewSignal>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSink { tx }, rx)
}

impl SignalSink {
    pub fn tree_changed(&self) {
        self.send(ViewSignal::TreeChanged);
    }

    pub fn node_changed(&self, id: NodeId) {
        self.send(ViewSignal::NodeChanged(id));
    }

    fn send(&self, signal: ViewSignal) {
        if self.tx.send(signal).is_err() {
            debug!(event = "view_signal_dropped", ?signal);
        }
    }
}
