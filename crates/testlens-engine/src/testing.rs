use crate::host::{EditorHost, OutlineParser};
use crate::signals::ViewSignal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use testlens_core::host_ipc::NotificationAction;
use testlens_core::outline::{Outline, OutlineKind, OutlineNode, ParseError};
use testlens_core::{DiscoveredNode, Document, Position, Span, TestTree};
use tokio::sync::mpsc::UnboundedReceiver;

fn outline_node(name: &str, kind: OutlineKind, line: u32, children: Vec<OutlineNode>) -> OutlineNode {
    OutlineNode {
        name: name.to_string(),
        text: None,
        start: Position::new(line, 0),
        end: Position::new(line + 2, 2),
        kind,
        focused: false,
        children,
    }
}

/// `math { adds, subtracts }`, `standalone`.
pub fn sample_outline() -> Outline {
    Outline {
        nodes: vec![
            outline_node(
                "math",
                OutlineKind::Describe,
                0,
                vec![
                    outline_node("adds", OutlineKind::It, 1, Vec::new()),
                    outline_node("subtracts", OutlineKind::It, 4, Vec::new()),
                ],
            ),
            outline_node("standalone", OutlineKind::Test, 10, Vec::new()),
        ],
    }
}

/// Builds a flattened set from `(key, parent, is_root)` triples.
pub fn discovered(entries: &[(&str, Option<&str>, bool)]) -> TestTree {
    let nodes = entries
        .iter()
        .enumerate()
        .map(|(line, (key, parent, root))| DiscoveredNode {
            key: key.to_string(),
            name: key.to_string(),
            text: String::new(),
            start: Position::new(line as u32, 0),
            end: Position::new(line as u32, 10),
            spec: false,
            focused: false,
            root: *root,
            parent: parent.map(str::to_string),
        })
        .collect();
    TestTree::from_discovered(nodes).expect("valid discovered set")
}

pub fn drain(rx: &mut UnboundedReceiver<ViewSignal>) -> Vec<ViewSignal> {
    let mut out = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        out.push(signal);
    }
    out
}

pub fn typescript_doc() -> Document {
    Document::new("file:///repo/math.test.ts", "typescript")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Highlight(Span),
    ClearHighlight,
    Select(Position),
    FocusPrimaryEditor,
    ShowError(String, Vec<NotificationAction>),
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub calls: Vec<HostCall>,
}

impl EditorHost for RecordingHost {
    fn highlight(&mut self, span: Span) {
        self.calls.push(HostCall::Highlight(span));
    }

    fn clear_highlight(&mut self) {
        self.calls.push(HostCall::ClearHighlight);
    }

    fn select(&mut self, position: Position) {
        self.calls.push(HostCall::Select(position));
    }

    fn focus_primary_editor(&mut self) {
        self.calls.push(HostCall::FocusPrimaryEditor);
    }

    fn show_error(&mut self, message: &str, actions: &[NotificationAction]) {
        self.calls
            .push(HostCall::ShowError(message.to_string(), actions.to_vec()));
    }
}

/// Serves a fixed outline, or fails when built with [`StaticParser::failing`].
#[derive(Debug)]
pub struct StaticParser {
    outline: Mutex<Option<Outline>>,
    calls: AtomicUsize,
}

impl StaticParser {
    pub fn new(outline: Outline) -> Self {
        Self {
            outline: Mutex::new(Some(outline)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            outline: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OutlineParser for StaticParser {
    async fn outline_from_doc(&self, _document: &Document) -> Result<Outline, ParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outline = self.outline.lock().expect("parser lock").clone();
        outline.ok_or_else(|| ParseError::Other("Unexpected token (3:1)".to_string()))
    }
}
