use std::future::Future;
use testlens_core::host_ipc::NotificationAction;
use testlens_core::outline::{Outline, ParseError};
use testlens_core::{Document, Position, Span};

/// Produces the nested test outline of a document.
pub trait OutlineParser: Send + Sync {
    fn outline_from_doc(
        &self,
        document: &Document,
    ) -> impl Future<Output = Result<Outline, ParseError>> + Send;
}

/// Editor-side effects the view asks for.
pub trait EditorHost {
    fn highlight(&mut self, span: Span);
    fn clear_highlight(&mut self);
    fn select(&mut self, position: Position);
    fn focus_primary_editor(&mut self);
    fn show_error(&mut self, message: &str, actions: &[NotificationAction]);
}
