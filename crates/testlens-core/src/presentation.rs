use crate::Node;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeIcon {
    Running,
    Failed,
    Passed,
    Focused,
    Spec,
    Container,
}

impl NodeIcon {
    /// Codicon id understood by most editor hosts.
    pub fn codicon(self) -> &'static str {
        match self {
            NodeIcon::Running => "loading~spin",
            NodeIcon::Failed => "error",
            NodeIcon::Passed => "pass",
            NodeIcon::Focused => "target",
            NodeIcon::Spec => "beaker",
            NodeIcon::Container => "symbol-class",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePresentation {
    pub label: String,
    pub description: Option<String>,
    pub tooltip: String,
    pub icon: NodeIcon,
    pub collapsible: bool,
}

impl Node {
    pub fn icon(&self) -> NodeIcon {
        if self.running {
            return NodeIcon::Running;
        }
        match &self.result {
            Some(outcome) if !outcome.passed => NodeIcon::Failed,
            Some(_) => NodeIcon::Passed,
            None if self.focused => NodeIcon::Focused,
            None if self.spec => NodeIcon::Spec,
            None => NodeIcon::Container,
        }
    }

    pub fn presentation(&self) -> NodePresentation {
        let description = if self.running {
            Some("running".to_string())
        } else {
            self.result.as_ref().map(|outcome| {
                if outcome.passed {
                    "passed".to_string()
                } else {
                    "failed".to_string()
                }
            })
        };

        let source = if self.text.is_empty() {
            &self.name
        } else {
            &self.text
        };
        let mut tooltip = if self.start.line == self.end.line {
            format!("{source}\nline {}", self.start.line + 1)
        } else {
            format!(
                "{source}\nlines {}-{}",
                self.start.line + 1,
                self.end.line + 1
            )
        };
        if let Some(output) = self.result.as_ref().and_then(|outcome| outcome.output.as_deref()) {
            let output = output.trim();
            if !output.is_empty() {
                tooltip.push_str("\n\n");
                tooltip.push_str(output);
            }
        }

        NodePresentation {
            label: self.name.clone(),
            description,
            tooltip,
            icon: self.icon(),
            collapsible: self.is_container(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::{Outline, OutlineKind, OutlineNode};
    use crate::{Position, TestOutcome, TestTree};

    fn leaf_tree(focused: bool) -> TestTree {
        TestTree::from_outline(&Outline {
            nodes: vec![OutlineNode {
                name: "renders".to_string(),
                text: Some("it('renders')".to_string()),
                start: Position::new(4, 2),
                end: Position::new(8, 4),
                kind: OutlineKind::It,
                focused,
                children: Vec::new(),
            }],
        })
    }

    #[test]
    fn running_takes_precedence_over_stale_result() {
        let mut tree = leaf_tree(false);
        let node = tree.iter_mut().nth(1).expect("leaf");
        node.result = Some(TestOutcome {
            passed: false,
            output: None,
        });
        node.running = true;

        let view = node.presentation();
        assert_eq!(view.icon, NodeIcon::Running);
        assert_eq!(view.description.as_deref(), Some("running"));
    }

    #[test]
    fn failed_result_puts_output_in_tooltip() {
        let mut tree = leaf_tree(false);
        let node = tree.iter_mut().nth(1).expect("leaf");
        node.result = Some(TestOutcome {
            passed: false,
            output: Some("expected 1 to be 2\n".to_string()),
        });

        let view = node.presentation();
        assert_eq!(view.icon, NodeIcon::Failed);
        assert_eq!(view.label, "renders");
        assert_eq!(view.tooltip, "it('renders')\nlines 5-9\n\nexpected 1 to be 2");
        assert!(!view.collapsible);
    }

    #[test]
    fn untouched_nodes_fall_back_to_kind_icons() {
        let focused = leaf_tree(true);
        assert_eq!(focused.iter().nth(1).expect("leaf").icon(), NodeIcon::Focused);

        let plain = leaf_tree(false);
        assert_eq!(plain.iter().nth(1).expect("leaf").icon(), NodeIcon::Spec);
        let root = plain.iter().next().expect("root").presentation();
        assert_eq!(root.icon, NodeIcon::Container);
        assert!(root.collapsible);
    }
}
