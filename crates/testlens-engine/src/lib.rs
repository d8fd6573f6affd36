//! Keeps a test tree in step with document edits and test runner events.

pub mod click;
pub mod discovery;
pub mod host;
pub mod reconcile;
pub mod scheduler;
pub mod signals;
pub mod view;

#[cfg(test)]
mod testing;

pub use click::{ClickDisambiguator, ClickIntent};
pub use discovery::DiscoveryIndex;
pub use host::{EditorHost, OutlineParser};
pub use reconcile::{ReconcileReport, ReconciliationEngine};
pub use scheduler::{ChangeScheduler, OutlineCache, SchedulerState};
pub use signals::{signal_channel, SignalSink, ViewSignal};
pub use view::{ParseTicket, ReadOutcome, TestTreeView};
