//! Progress events emitted while importing.
//!
//! The importer never waits on the consumer: events go into an unbounded channel and a
//! send to a dropped receiver is ignored.

use crate::outcome::Outcome;
use tokio::sync::mpsc;

pub type ProgressReceiver = mpsc::UnboundedReceiver<Outcome>;

#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<Outcome>>,
}

/// A connected sink and receiver pair.
#[must_use]
pub fn channel() -> (ProgressSink, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSink { tx: Some(tx) }, rx)
}

impl ProgressSink {
    /// A sink that discards every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: Outcome) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

/// Drain every event currently buffered in `rx` without waiting.
pub fn drain(rx: &mut ProgressReceiver) -> Vec<Outcome> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}
