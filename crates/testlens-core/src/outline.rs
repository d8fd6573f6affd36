use crate::Position;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    #[serde(default)]
    pub nodes: Vec<OutlineNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub start: Position,
    pub end: Position,
    pub kind: OutlineKind,
    #[serde(default, alias = "only")]
    pub focused: bool,
    #[serde(default, alias = "nodes", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlineKind {
    #[serde(alias = "suite")]
    Describe,
    #[serde(alias = "spec")]
    It,
    Test,
}

impl OutlineKind {
    pub fn is_spec(self) -> bool {
        matches!(self, OutlineKind::It | OutlineKind::Test)
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to start outline parser: {0}")]
    Spawn(#[source] io::Error),
    #[error("outline parser i/o failed: {0}")]
    Io(#[source] io::Error),
    #[error("outline parser exited with {}: {stderr}", describe_exit(.code))]
    Exit { code: Option<i32>, stderr: String },
    #[error("outline parser timed out after {0:?}")]
    Timeout(Duration),
    #[error("outline decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "signal".to_string(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OutlineWire {
    Wrapped(Outline),
    Bare(Vec<OutlineNode>),
}

/// Decodes parser output; accepts `{"nodes": [...]}` or a bare node array.
pub fn decode_outline(bytes: &[u8]) -> Result<Outline, ParseError> {
    let wire: OutlineWire = serde_json::from_slice(bytes)?;
    Ok(match wire {
        OutlineWire::Wrapped(outline) => outline,
        OutlineWire::Bare(nodes) => Outline { nodes },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wrapped_and_bare_outlines() {
        let wrapped = br#"{"nodes": [{"name": "suite", "kind": "describe",
            "start": {"line": 0, "column": 0}, "end": {"line": 5, "column": 2},
            "children": [{"name": "works", "kind": "it", "only": true,
                "start": {"line": 1, "column": 2}, "end": {"line": 3, "column": 4}}]}]}"#;
        let outline = decode_outline(wrapped).expect("wrapped");
        assert_eq!(outline.nodes.len(), 1);
        assert_eq!(outline.nodes[0].kind, OutlineKind::Describe);
        assert!(outline.nodes[0].children[0].focused);
        assert!(outline.nodes[0].children[0].kind.is_spec());

        let bare = br#"[{"name": "solo", "kind": "test",
            "start": {"line": 0, "column": 0}, "end": {"line": 1, "column": 0}}]"#;
        let outline = decode_outline(bare).expect("bare");
        assert_eq!(outline.nodes[0].name, "solo");
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let input = br#"[{"name": "x", "kind": "bench",
            "start": {"line": 0, "column": 0}, "end": {"line": 0, "column": 1}}]"#;
        assert!(matches!(decode_outline(input), Err(ParseError::Decode(_))));
    }

    #[test]
    fn exit_error_mentions_code_or_signal() {
        let with_code = ParseError::Exit {
            code: Some(2),
            stderr: "SyntaxError".to_string(),
        };
        assert_eq!(
            with_code.to_string(),
            "outline parser exited with 2: SyntaxError"
        );
        let killed = ParseError::Exit {
            code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("signal"));
    }
}
