//! Event types for the curation event system
//!
//! Provides the shared event definitions and EventBus used by the curation
//! pipeline and any front end observing it.

mod import_types;

pub use import_types::{ImportProgress, ImportSummary};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Curation pipeline events
///
/// Events are broadcast via EventBus and serialize with a `type` tag so a
/// front end can forward them as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CurateEvent {
    /// A curation entered the working set
    CurationAdded {
        key: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A curation left the working set (explicit removal, folder deleted, or
    /// successful import)
    CurationRemoved {
        key: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Meta, add-apps, images, lock state or unused dirs of a curation changed
    CurationChanged {
        key: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The content manifest of a curation was regenerated
    ContentChanged {
        key: String,
        /// Number of entries in the new manifest
        entries: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A collision check finished and was applied
    CollisionsComputed {
        key: String,
        /// Entries checked
        checked: usize,
        /// Entries that already exist under the install root
        existing: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// An import of a single curation began
    ImportStarted {
        key: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bulk import progress
    ///
    /// Emitted after each curation of an import-all batch.
    ImportProgress {
        progress: ImportProgress,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A curation was accepted by the content store
    ImportCompleted {
        key: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The content store rejected a curation
    ImportFailed {
        key: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A curation was written to an archive
    ExportCompleted {
        key: String,
        destination: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl CurateEvent {
    /// Curation key the event concerns, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            CurateEvent::CurationAdded { key, .. }
            | CurateEvent::CurationRemoved { key, .. }
            | CurateEvent::CurationChanged { key, .. }
            | CurateEvent::ContentChanged { key, .. }
            | CurateEvent::CollisionsComputed { key, .. }
            | CurateEvent::ImportStarted { key, .. }
            | CurateEvent::ImportCompleted { key, .. }
            | CurateEvent::ImportFailed { key, .. }
            | CurateEvent::ExportCompleted { key, .. } => Some(key),
            CurateEvent::ImportProgress { .. } => None,
        }
    }

    /// Short name of the event variant, for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            CurateEvent::CurationAdded { .. } => "CurationAdded",
            CurateEvent::CurationRemoved { .. } => "CurationRemoved",
            CurateEvent::CurationChanged { .. } => "CurationChanged",
            CurateEvent::ContentChanged { .. } => "ContentChanged",
            CurateEvent::CollisionsComputed { .. } => "CollisionsComputed",
            CurateEvent::ImportStarted { .. } => "ImportStarted",
            CurateEvent::ImportProgress { .. } => "ImportProgress",
            CurateEvent::ImportCompleted { .. } => "ImportCompleted",
            CurateEvent::ImportFailed { .. } => "ImportFailed",
            CurateEvent::ExportCompleted { .. } => "ExportCompleted",
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a `tokio::sync::broadcast` channel. Slow subscribers
/// lag and lose the oldest events rather than blocking emitters.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CurateEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    ///
    /// # Examples
    ///
    /// ```
    /// use fpl_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CurateEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CurateEvent,
    ) -> Result<usize, broadcast::error::SendError<CurateEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CurateEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changed(key: &str) -> CurateEvent {
        CurateEvent::CurationChanged {
            key: key.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_emit_without_subscribers_fails() {
        let bus = EventBus::new(8);
        assert!(bus.emit(changed("a")).is_err());
        // Lossy variant swallows the same condition
        bus.emit_lossy(changed("a"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(changed("a")).unwrap();
        bus.emit(changed("b")).unwrap();

        assert_eq!(rx.recv().await.unwrap().key(), Some("a"));
        assert_eq!(rx.recv().await.unwrap().key(), Some("b"));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = CurateEvent::ImportProgress {
            progress: ImportProgress::new(2, 5),
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ImportProgress");
        assert_eq!(json["progress"]["current"], 2);
        assert_eq!(event.key(), None);
        assert_eq!(event.event_type(), "ImportProgress");
    }
}
