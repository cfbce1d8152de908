//! Mirrors the panel's own log output into the console log.
//!
//! [`ConsoleLayer`] is a `tracing` layer that formats each event as one
//! line and queues it; [`forward`] drains the queue into
//! `server.logs.console`. Events from the tree and sync internals are
//! skipped so recording a line can never produce another one.

use std::fmt::Write as _;
use std::sync::Arc;

use mirador_core::Dashboard;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Targets whose events are never mirrored.
const SKIPPED_TARGETS: [&str; 2] = ["mirador_tree", "mirador_core::sync"];

/// Collects the message and fields of one event.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl Visit for LineVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }
}

/// A `tracing` layer queueing formatted lines for the console log.
#[derive(Debug, Clone)]
pub struct ConsoleLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl ConsoleLayer {
    /// Create the layer and the receiving end of its queue.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

/// Render an event as `LEVEL target: message key=value ...`.
fn format_line(event: &Event<'_>) -> String {
    let metadata = event.metadata();
    let mut visitor = LineVisitor::default();
    event.record(&mut visitor);
    format!(
        "{} {}: {}{}",
        metadata.level(),
        metadata.target(),
        visitor.message,
        visitor.fields
    )
}

impl<S: Subscriber> Layer<S> for ConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if SKIPPED_TARGETS.iter().any(|skip| target.starts_with(skip)) {
            return;
        }
        // The receiver is gone only during shutdown.
        let _ = self.tx.send(format_line(event));
    }
}

/// Drain queued lines into the dashboard until the layer is dropped.
pub async fn forward(mut rx: mpsc::UnboundedReceiver<String>, dashboard: Arc<Dashboard>) {
    while let Some(line) = rx.recv().await {
        if dashboard.record_console(&line).await.is_err() {
            break;
        }
    }
}
