use std::process::Stdio;
use std::time::Duration;
use testlens_core::outline::{decode_outline, Outline, ParseError};
use testlens_core::Document;
use testlens_engine::OutlineParser;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Runs an external command that prints the outline of a document as JSON.
///
/// The document path is appended to the configured arguments when known and
/// the in-memory text, when present, is piped to stdin.
#[derive(Debug, Clone)]
pub struct CommandOutlineParser {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOutlineParser {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    fn command(&self, document: &Document) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(path) = &document.path {
            command.arg(path);
        }
        let stdin = if document.text.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        command
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl OutlineParser for CommandOutlineParser {
    async fn outline_from_doc(&self, document: &Document) -> Result<Outline, ParseError> {
        let mut child = self.command(document).spawn().map_err(ParseError::Spawn)?;
        if let (Some(mut stdin), Some(text)) = (child.stdin.take(), document.text.clone()) {
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(text.as_bytes()).await {
                    debug!(event = "outline_stdin_closed", error = %err);
                }
            });
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ParseError::Timeout(self.timeout))?
            .map_err(ParseError::Io)?;
        if !output.status.success() {
            return Err(ParseError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        debug!(
            event = "outline_command_done",
            uri = %document.uri,
            bytes = output.stdout.len()
        );
        decode_outline(&output.stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const OUTLINE: &str = r#"{"nodes":[{"name":"math","kind":"describe","start":{"line":0,"column":0},"end":{"line":5,"column":2},"children":[{"name":"adds","kind":"it","start":{"line":1,"column":2},"end":{"line":3,"column":4}}]}]}"#;

    fn doc_with_text(text: &str) -> Document {
        Document::new("untitled:math.test.ts", "typescript").with_text(text)
    }

    #[tokio::test]
    async fn decodes_outline_printed_by_the_command() {
        let parser = CommandOutlineParser::new("cat", Vec::new(), Duration::from_secs(5));

        let outline = parser
            .outline_from_doc(&doc_with_text(OUTLINE))
            .await
            .expect("outline");

        assert_eq!(outline.nodes.len(), 1);
        assert_eq!(outline.nodes[0].children[0].name, "adds");
    }

    #[tokio::test]
    async fn failing_command_reports_exit_status() {
        let parser = CommandOutlineParser::new("false", Vec::new(), Duration::from_secs(5));

        let err = parser
            .outline_from_doc(&Document::new("file:///x.test.ts", "typescript"))
            .await
            .expect_err("non-zero exit");

        assert!(matches!(err, ParseError::Exit { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let parser = CommandOutlineParser::new("cat", Vec::new(), Duration::from_secs(5));

        let err = parser
            .outline_from_doc(&doc_with_text("SyntaxError: Unexpected token"))
            .await
            .expect_err("not json");

        assert!(matches!(err, ParseError::Decode(_)));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let parser = CommandOutlineParser::new(
            "sleep",
            vec!["5".to_string()],
            Duration::from_millis(50),
        );

        let err = parser
            .outline_from_doc(&Document::new("file:///x.test.ts", "typescript"))
            .await
            .expect_err("timeout");

        assert!(matches!(err, ParseError::Timeout(_)));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let parser = CommandOutlineParser::new(
            "testlens-no-such-outline-command",
            Vec::new(),
            Duration::from_secs(1),
        );

        let err = parser
            .outline_from_doc(&Document::new("file:///x.test.ts", "typescript"))
            .await
            .expect_err("spawn");

        assert!(matches!(err, ParseError::Spawn(_)));
    }

    #[tokio::test]
    async fn document_path_is_passed_as_last_argument() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("math.test.ts.json");
        std::fs::write(&path, OUTLINE).expect("write");
        let parser = CommandOutlineParser::new("cat", Vec::new(), Duration::from_secs(5));
        let document = Document::new("file:///repo/math.test.ts", "typescript").with_path(path.clone());

        let outline = parser.outline_from_doc(&document).await.expect("outline");
        assert_eq!(outline.nodes[0].name, "math");
    }
}
