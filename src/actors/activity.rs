//! Activity sink - Thin ingress for externally captured events
//!
//! Capture providers run on their own OS threads and call
//! [`ActivitySink::record`], which only enqueues. The intake actor persists
//! the queue one event at a time, in arrival order. Persisting failures are
//! logged and the event is dropped; nothing is ever reported back to the
//! provider.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::ActivityCategory;
use crate::storage::TelemetryStore;

/// Longest description kept, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 1024;

#[derive(Debug)]
struct IncomingEvent {
    category: ActivityCategory,
    description: String,
}

/// Trim and cap a free-text description
pub fn normalize_description(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(MAX_DESCRIPTION_CHARS) {
        Some((cut, _)) => trimmed[..cut].to_string(),
        None => trimmed.to_string(),
    }
}

/// Handle given to capture providers
///
/// Cheap to clone, callable from any thread, never blocks.
#[derive(Clone)]
pub struct ActivitySink {
    sender: mpsc::UnboundedSender<IncomingEvent>,
    shutdown: CancellationToken,
}

impl ActivitySink {
    /// Spawn the intake actor
    ///
    /// Once `shutdown` is cancelled the sink stops accepting events, the
    /// actor persists whatever is already queued and exits.
    pub fn spawn(
        store: Arc<dyn TelemetryStore>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();

        let actor = ActivityIntakeActor {
            store,
            receiver,
            shutdown: shutdown.clone(),
            stored: 0,
            dropped: 0,
        };
        let task = tokio::spawn(actor.run());

        (Self { sender, shutdown }, task)
    }

    /// Record one event
    pub fn record(&self, category: ActivityCategory, description: &str) {
        if self.shutdown.is_cancelled() {
            trace!("activity sink stopped, dropping {category} event");
            return;
        }

        let event = IncomingEvent {
            category,
            description: normalize_description(description),
        };
        if self.sender.send(event).is_err() {
            debug!("activity intake is gone, dropping {category} event");
        }
    }

    /// Record an event whose category is free text; unknown categories become `other`
    pub fn record_raw(&self, category: &str, description: &str) {
        self.record(ActivityCategory::parse_lossy(category), description);
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }
}

struct ActivityIntakeActor {
    store: Arc<dyn TelemetryStore>,
    receiver: mpsc::UnboundedReceiver<IncomingEvent>,
    shutdown: CancellationToken,
    stored: u64,
    dropped: u64,
}

impl ActivityIntakeActor {
    #[instrument(skip(self), name = "activity_intake")]
    async fn run(mut self) {
        debug!("starting activity intake");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                event = self.receiver.recv() => match event {
                    Some(event) => self.persist(event).await,
                    None => break,
                },
            }
        }

        // drain what was accepted before the stop
        self.receiver.close();
        while let Some(event) = self.receiver.recv().await {
            self.persist(event).await;
        }

        self.shutdown.cancel();
        debug!(
            "activity intake stopped ({} stored, {} dropped)",
            self.stored, self.dropped
        );
    }

    async fn persist(&mut self, event: IncomingEvent) {
        match self
            .store
            .append_event(event.category, &event.description)
            .await
        {
            Ok(stored) => {
                self.stored += 1;
                trace!("stored {} event at {}", stored.category, stored.timestamp);
            }
            Err(e) => {
                self.dropped += 1;
                warn!("failed to store {} event: {e}", event.category);
            }
        }
    }
}
