use crate::watch::{document_watcher, DocumentWatcher};
use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use testlens_core::config::ViewConfig;
use testlens_core::host_ipc::{
    encode_frame, ChildrenPayload, DecodeReport, Envelope, ErrorPayload, HighlightPayload, HostMsg,
    NdjsonFrameDecoder, NotificationAction, NotificationLevel, NotificationPayload, SelectPayload,
    TreeChangedPayload, TreeItem, ViewMsg, CURRENT_PROTOCOL_VERSION, DEFAULT_MAX_FRAME_BYTES,
};
use testlens_core::outline::{Outline, ParseError};
use testlens_core::{NodeId, Position, Span, TestTree};
use testlens_engine::{
    signal_channel, EditorHost, OutlineParser, ParseTicket, ReadOutcome, TestTreeView, ViewSignal,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

const READ_CHUNK_BYTES: usize = 8 * 1024;
const WATCH_SETTLE: Duration = Duration::from_millis(100);

type ParseDone = (ParseTicket, Result<Outline, ParseError>);

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Turns editor intents into outbound frames.
#[derive(Debug, Clone)]
pub struct FrameHost {
    out: mpsc::UnboundedSender<Envelope<ViewMsg>>,
}

impl FrameHost {
    fn send(&self, request_id: Option<String>, msg: ViewMsg) {
        let envelope = Envelope::new(now_timestamp(), msg).with_request_id(request_id);
        if self.out.send(envelope).is_err() {
            debug!(event = "frame_dropped", reason = "writer_closed");
        }
    }
}

impl EditorHost for FrameHost {
    fn highlight(&mut self, span: Span) {
        self.send(None, ViewMsg::Highlight(HighlightPayload { span }));
    }

    fn clear_highlight(&mut self) {
        self.send(None, ViewMsg::ClearHighlight);
    }

    fn select(&mut self, position: Position) {
        self.send(None, ViewMsg::Select(SelectPayload { position }));
    }

    fn focus_primary_editor(&mut self) {
        self.send(None, ViewMsg::FocusPrimaryEditor);
    }

    fn show_error(&mut self, message: &str, actions: &[NotificationAction]) {
        self.send(
            None,
            ViewMsg::Notification(NotificationPayload {
                level: NotificationLevel::Error,
                message: message.to_string(),
                actions: actions.to_vec(),
            }),
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

/// Requests waiting on the parse started for one cache generation.
struct PendingRead {
    generation: u64,
    waiters: Vec<Option<String>>,
}

struct Session<P> {
    view: TestTreeView<FrameHost>,
    parser: Arc<P>,
    parse_tx: mpsc::UnboundedSender<ParseDone>,
    pending_read: Option<PendingRead>,
    watcher: Option<DocumentWatcher>,
}

impl<P: OutlineParser + 'static> Session<P> {
    fn handle_report(
        &mut self,
        report: DecodeReport<Envelope<HostMsg>>,
        signals: &mut mpsc::UnboundedReceiver<ViewSignal>,
    ) -> Flow {
        for err in report.errors {
            self.error(None, "bad_frame", err.to_string());
        }
        for envelope in report.frames {
            if envelope.version.0 > CURRENT_PROTOCOL_VERSION {
                self.error(
                    envelope.request_id,
                    "unsupported_version",
                    format!(
                        "protocol version {} is newer than {CURRENT_PROTOCOL_VERSION}",
                        envelope.version.0
                    ),
                );
                continue;
            }
            let flow = self.handle(envelope);
            self.flush_signals(signals);
            if flow == Flow::Shutdown {
                return Flow::Shutdown;
            }
        }
        Flow::Continue
    }

    fn handle(&mut self, envelope: Envelope<HostMsg>) -> Flow {
        let request_id = envelope.request_id;
        match envelope.msg {
            HostMsg::ActiveEditorChanged(payload) => {
                if self.view.on_active_editor_changed(payload.editor.as_ref()) {
                    self.follow_document();
                }
            }
            HostMsg::DocumentChanged(payload) => {
                self.view
                    .on_document_changed(&payload.document, payload.content_changes);
            }
            HostMsg::DocumentSaved(payload) => {
                self.view.on_document_saved(&payload.document);
            }
            HostMsg::TestsDiscovered(payload) => match TestTree::from_discovered(payload.nodes) {
                Ok(tree) => self.view.on_discovered(tree),
                Err(err) => self.error(request_id, "invalid_discovery", err.to_string()),
            },
            HostMsg::TestRunStarted(payload) => {
                if let Some(id) = self.resolve(&request_id, &payload.key) {
                    self.view.on_test_run_started(id);
                }
            }
            HostMsg::PrepareRun(payload) => {
                if let Some(id) = self.resolve(&request_id, &payload.key) {
                    self.view.prepare_run(id);
                }
            }
            HostMsg::TestResults(payload) => {
                self.view.on_test_results(&payload.results);
            }
            HostMsg::GetChildren(payload) => self.get_children(request_id, payload.parent),
            HostMsg::Click(payload) => {
                if let Some(id) = self.resolve(&request_id, &payload.key) {
                    self.view.click(id, Instant::now());
                }
            }
            HostMsg::Configure(patch) => self.view.configure(patch),
            HostMsg::Shutdown => {
                info!(event = "shutdown_requested");
                return Flow::Shutdown;
            }
        }
        Flow::Continue
    }

    fn resolve(&self, request_id: &Option<String>, key: &str) -> Option<NodeId> {
        let id = self.view.id_of(key);
        if id.is_none() {
            self.error(
                request_id.clone(),
                "unknown_node",
                format!("no discovered node with key {key:?}"),
            );
        }
        id
    }

    fn get_children(&mut self, request_id: Option<String>, parent: Option<String>) {
        let parent_id = match parent.as_deref() {
            Some(key) => match self.resolve(&request_id, key) {
                Some(id) => Some(id),
                None => return,
            },
            None => None,
        };
        match self.view.begin_read(parent_id) {
            ReadOutcome::Ready(ids) => self.reply_children(request_id, parent, Some(ids)),
            ReadOutcome::NoData => self.reply_children(request_id, parent, None),
            ReadOutcome::NeedsParse(ticket) => self.start_parse(request_id, ticket),
        }
    }

    fn start_parse(&mut self, request_id: Option<String>, ticket: ParseTicket) {
        let generation = ticket.generation();
        if let Some(pending) = &mut self.pending_read {
            if pending.generation == generation {
                pending.waiters.push(request_id);
                return;
            }
        }
        if let Some(outdated) = self.pending_read.take() {
            for waiter in outdated.waiters {
                self.reply_children(waiter, None, None);
            }
        }
        self.pending_read = Some(PendingRead {
            generation,
            waiters: vec![request_id],
        });

        debug!(
            event = "outline_parse_started",
            uri = %ticket.document().uri,
            generation
        );
        let parser = Arc::clone(&self.parser);
        let tx = self.parse_tx.clone();
        tokio::spawn(async move {
            let result = parser.outline_from_doc(ticket.document()).await;
            let _ = tx.send((ticket, result));
        });
    }

    fn on_parse_done(&mut self, ticket: ParseTicket, result: Result<Outline, ParseError>) {
        let waiters = match self.pending_read.take() {
            Some(pending) if pending.generation == ticket.generation() => pending.waiters,
            other => {
                self.pending_read = other;
                Vec::new()
            }
        };
        let roots = self.view.complete_read(ticket, result);
        for waiter in waiters {
            self.reply_children(waiter, None, roots.clone());
        }
    }

    fn reply_children(
        &self,
        request_id: Option<String>,
        parent: Option<String>,
        ids: Option<Vec<NodeId>>,
    ) {
        let items = ids.map(|ids| {
            ids.iter()
                .filter_map(|id| self.view.node(*id))
                .map(TreeItem::from)
                .collect()
        });
        self.view.host().send(
            request_id,
            ViewMsg::Children(ChildrenPayload { parent, items }),
        );
    }

    fn on_signal(&self, signal: ViewSignal) {
        let key = match signal {
            ViewSignal::TreeChanged => None,
            ViewSignal::NodeChanged(id) => match self.view.node(id) {
                Some(node) => Some(node.key.clone()),
                None => return,
            },
        };
        self.view
            .host()
            .send(None, ViewMsg::TreeChanged(TreeChangedPayload { key }));
    }

    fn flush_signals(&self, signals: &mut mpsc::UnboundedReceiver<ViewSignal>) {
        while let Ok(signal) = signals.try_recv() {
            self.on_signal(signal);
        }
    }

    fn error(&self, request_id: Option<String>, code: &str, message: String) {
        warn!(event = "protocol_error", code, message = %message);
        self.view.host().send(
            request_id,
            ViewMsg::Error(ErrorPayload {
                code: code.to_string(),
                message,
            }),
        );
    }

    fn follow_document(&mut self) {
        let path = self.view.document().and_then(|document| document.path.clone());
        if let Some(watcher) = &mut self.watcher {
            watcher.follow(path.as_deref());
            debug!(event = "watch_target", path = ?watcher.watched());
        }
    }

    fn watches(&self, path: &std::path::Path) -> bool {
        self.watcher
            .as_ref()
            .is_some_and(|watcher| watcher.matches(path))
    }

    /// A write on disk counts as a save; the buffer text is dropped so the
    /// parser reads the file.
    fn on_watched_write(&mut self) {
        let Some(mut document) = self.view.document().cloned() else {
            return;
        };
        document.text = None;
        info!(event = "document_written", uri = %document.uri);
        if !self.view.on_document_saved(&document) {
            self.view.on_document_changed(&document, 1);
        }
    }
}

async fn recv_watch(rx: &mut Option<mpsc::UnboundedReceiver<PathBuf>>) -> Option<PathBuf> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn settle_elapsed(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn writer_loop<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Envelope<ViewMsg>>,
) -> io::Result<()> {
    while let Some(envelope) = rx.recv().await {
        let bytes = match encode_frame(&envelope, DEFAULT_MAX_FRAME_BYTES) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(event = "frame_encode_failed", error = %err);
                let fallback = Envelope::new(
                    now_timestamp(),
                    ViewMsg::Error(ErrorPayload {
                        code: "frame_too_large".to_string(),
                        message: err.to_string(),
                    }),
                )
                .with_request_id(envelope.request_id);
                match encode_frame(&fallback, DEFAULT_MAX_FRAME_BYTES) {
                    Ok(bytes) => bytes,
                    Err(_) => continue,
                }
            }
        };
        writer.write_all(&bytes).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Serves one host over `reader`/`writer` until it disconnects or asks to
/// shut down.
pub async fn run_session<R, W, P>(
    mut reader: R,
    writer: W,
    config: ViewConfig,
    parser: P,
    watch: bool,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    P: OutlineParser + 'static,
{
    let (signals, mut signal_rx) = signal_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(writer_loop(writer, out_rx));
    let (parse_tx, mut parse_rx) = mpsc::unbounded_channel::<ParseDone>();

    let (watcher, mut watch_rx) = if watch {
        match document_watcher() {
            Ok((watcher, rx)) => (Some(watcher), Some(rx)),
            Err(err) => {
                warn!(event = "watch_unavailable", error = %err);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let mut session = Session {
        view: TestTreeView::new(config, FrameHost { out: out_tx }, signals),
        parser: Arc::new(parser),
        parse_tx,
        pending_read: None,
        watcher,
    };
    info!(event = "session_start", watch = session.watcher.is_some());

    let mut decoder = NdjsonFrameDecoder::<Envelope<HostMsg>>::new(DEFAULT_MAX_FRAME_BYTES);
    let mut buf = vec![0u8; READ_CHUNK_BYTES];
    let mut watch_settle: Option<Pin<Box<Sleep>>> = None;

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = read.context("reading host frames")?;
                let report = if n == 0 {
                    decoder.finish()
                } else {
                    decoder.push_chunk(&buf[..n])
                };
                if session.handle_report(report, &mut signal_rx) == Flow::Shutdown {
                    break;
                }
                if n == 0 {
                    info!(event = "host_closed");
                    break;
                }
            }
            Some((ticket, result)) = parse_rx.recv() => {
                session.on_parse_done(ticket, result);
                session.flush_signals(&mut signal_rx);
            }
            Some(signal) = signal_rx.recv() => session.on_signal(signal),
            Some(path) = recv_watch(&mut watch_rx) => {
                if session.watches(&path) {
                    let deadline = tokio::time::Instant::now() + WATCH_SETTLE;
                    match &mut watch_settle {
                        Some(sleep) => sleep.as_mut().reset(deadline),
                        None => {
                            watch_settle = Some(Box::pin(tokio::time::sleep_until(deadline)));
                        }
                    }
                }
            }
            () = settle_elapsed(&mut watch_settle) => {
                watch_settle = None;
                session.on_watched_write();
                session.flush_signals(&mut signal_rx);
            }
        }
    }

    drop(session);
    writer_task
        .await
        .context("writer task panicked")?
        .context("writing view frames")?;
    info!(event = "session_end");
    Ok(())
}
