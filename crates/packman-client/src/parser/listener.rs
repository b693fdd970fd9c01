//! Progress events emitted while a console transcript is parsed

use tracing::{debug, info, warn};

/// One event recovered from the console transcript, in transcript order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The transcript title, e.g. `Installing content`
    Start { title: String },
    /// A plain log fragment
    Log { line: String },
    /// A single-letter action applied to a repository path (`A`, `U`, `D`, ...)
    Progress { action: String, path: String },
    /// A structured message that is not tied to a path
    Message { text: String },
    /// An error reported for a path; processing continued
    Error { path: String, error: String },
}

/// Receiver of progress events; the listener decides what to keep
pub trait ProgressListener: Send {
    fn on_event(&mut self, event: ProgressEvent);
}

/// Listener that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl ProgressListener for NoopListener {
    fn on_event(&mut self, _event: ProgressEvent) {}
}

/// Listener that forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl ProgressListener for TracingListener {
    fn on_event(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Start { title } => info!("{}", title),
            ProgressEvent::Log { line } => debug!("{}", line),
            ProgressEvent::Progress { action, path } => debug!("{} {}", action, path),
            ProgressEvent::Message { text } => info!("{}", text),
            ProgressEvent::Error { path, error } => warn!("E {} ({})", path, error),
        }
    }
}

/// Collects every event
impl ProgressListener for Vec<ProgressEvent> {
    fn on_event(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

impl<L: ProgressListener + ?Sized> ProgressListener for &mut L {
    fn on_event(&mut self, event: ProgressEvent) {
        (**self).on_event(event);
    }
}
