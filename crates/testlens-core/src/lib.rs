pub mod config;
pub mod document;
pub mod host_ipc;
pub mod outline;
pub mod presentation;

use outline::{Outline, OutlineNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub use document::{Document, Editor};

/// Key of the synthetic node that parents every top-level outline entry.
pub const ROOT_KEY: &str = "__root__";

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

fn next_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    #[serde(alias = "col")]
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Handle to a node inside one discovered [`TestTree`].
///
/// The epoch is unique per tree, so an id minted for an earlier discovery
/// never resolves against a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    epoch: u64,
    index: u32,
}

impl NodeId {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.epoch, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// One entry of a runner's result batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_name: String,
    pub is_passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl TestResult {
    pub fn passed(test_name: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            is_passed: true,
            output: None,
        }
    }

    pub fn failed(test_name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            test_name: test_name.into(),
            is_passed: false,
            output: Some(output.into()),
        }
    }

    pub fn outcome(&self) -> TestOutcome {
        TestOutcome {
            passed: self.is_passed,
            output: self.output.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub key: String,
    pub name: String,
    pub text: String,
    pub start: Position,
    pub end: Position,
    pub spec: bool,
    pub focused: bool,
    pub running: bool,
    pub result: Option<TestOutcome>,
    pub parent: Option<NodeId>,
    pub nodes: Vec<NodeId>,
    root: bool,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.root
    }

    pub fn is_container(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn is_runnable(&self) -> bool {
        self.spec
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }
}

/// Flattened discovery entry as sent by a host. Parents must precede their
/// children and are referenced by key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredNode {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub start: Position,
    #[serde(default)]
    pub end: Position,
    #[serde(default)]
    pub spec: bool,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub root: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {key} references unknown parent {parent} (parents must precede children)")]
    UnknownParent { key: String, parent: String },
    #[error("node {key} lists itself as parent")]
    SelfParent { key: String },
    #[error("discovered set exceeds {max} nodes")]
    TooLarge { max: usize },
}

/// One complete discovered set, stored flat in pre-order.
#[derive(Debug, Clone, PartialEq)]
pub struct TestTree {
    epoch: u64,
    nodes: Vec<Node>,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl TestTree {
    pub fn empty() -> Self {
        Self {
            epoch: next_epoch(),
            nodes: Vec::new(),
        }
    }

    /// Builds a set from a parsed outline, adding a synthetic root node.
    pub fn from_outline(outline: &Outline) -> Self {
        let epoch = next_epoch();
        let root_id = NodeId { epoch, index: 0 };
        let mut tree = Self {
            epoch,
            nodes: vec![Node {
                id: root_id,
                key: ROOT_KEY.to_string(),
                name: ROOT_KEY.to_string(),
                text: String::new(),
                start: Position::default(),
                end: Position::default(),
                spec: false,
                focused: false,
                running: false,
                result: None,
                parent: None,
                nodes: Vec::new(),
                root: true,
            }],
        };
        for entry in &outline.nodes {
            tree.push_outline_node(entry, root_id, None);
        }
        tree
    }

    fn push_outline_node(&mut self, entry: &OutlineNode, parent: NodeId, prefix: Option<&str>) {
        let id = NodeId {
            epoch: self.epoch,
            index: self.nodes.len() as u32,
        };
        let key = match prefix {
            Some(prefix) => format!("{prefix} {}", entry.name),
            None => entry.name.clone(),
        };
        self.nodes.push(Node {
            id,
            key: key.clone(),
            name: entry.name.clone(),
            text: entry.text.clone().unwrap_or_else(|| entry.name.clone()),
            start: entry.start,
            end: entry.end,
            spec: entry.kind.is_spec(),
            focused: entry.focused,
            running: false,
            result: None,
            parent: Some(parent),
            nodes: Vec::new(),
            root: false,
        });
        self.nodes[parent.index()].nodes.push(id);
        for child in &entry.children {
            self.push_outline_node(child, id, Some(&key));
        }
    }

    pub fn from_discovered(entries: Vec<DiscoveredNode>) -> Result<Self, TreeError> {
        if entries.len() > u32::MAX as usize {
            return Err(TreeError::TooLarge {
                max: u32::MAX as usize,
            });
        }
        let epoch = next_epoch();
        let mut seen: HashMap<String, NodeId> = HashMap::with_capacity(entries.len());
        let mut nodes: Vec<Node> = Vec::with_capacity(entries.len());

        for entry in entries {
            let id = NodeId {
                epoch,
                index: nodes.len() as u32,
            };
            let parent = match entry.parent.as_deref() {
                Some(parent) if parent == entry.key => {
                    return Err(TreeError::SelfParent { key: entry.key });
                }
                Some(parent) => match seen.get(parent) {
                    Some(parent_id) => Some(*parent_id),
                    None => {
                        return Err(TreeError::UnknownParent {
                            key: entry.key,
                            parent: parent.to_string(),
                        });
                    }
                },
                None => None,
            };
            if let Some(parent_id) = parent {
                nodes[parent_id.index()].nodes.push(id);
            }
            seen.entry(entry.key.clone()).or_insert(id);
            nodes.push(Node {
                id,
                key: entry.key,
                name: entry.name,
                text: entry.text,
                start: entry.start,
                end: entry.end,
                spec: entry.spec,
                focused: entry.focused,
                running: false,
                result: None,
                parent,
                nodes: Vec::new(),
                root: entry.root && parent.is_none(),
            });
        }

        Ok(Self { epoch, nodes })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.epoch == self.epoch && id.index() < self.nodes.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.epoch != self.epoch {
            return None;
        }
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.epoch != self.epoch {
            return None;
        }
        self.nodes.get_mut(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.iter_mut()
    }

    /// The node and everything below it, in source order.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.get(next) {
                stack.extend(node.nodes.iter().rev().copied());
            }
        }
        out
    }
}
