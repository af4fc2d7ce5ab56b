//! Activity events emitted by session loops.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the broadcast channel. Slow subscribers lose old events.
pub const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Start,
    Stop,
    Search,
    Visit,
    Scroll,
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActivityKind::Start => "start",
            ActivityKind::Stop => "stop",
            ActivityKind::Search => "search",
            ActivityKind::Visit => "visit",
            ActivityKind::Scroll => "scroll",
        };
        f.write_str(s)
    }
}

/// One activity record, in the shape a UI subscriber consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub persona_id: String,
    pub persona_name: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(
        persona_id: impl Into<String>,
        persona_name: impl Into<String>,
        kind: ActivityKind,
        details: impl Into<String>,
    ) -> Self {
        Self {
            persona_id: persona_id.into(),
            persona_name: persona_name.into(),
            kind,
            details: details.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Fan-out channel owned by the session runner.
///
/// Emitting never blocks and never fails. With no subscribers the event
/// is dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ActivityEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, event: ActivityEvent) {
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = ActivityEvent::new("p1", "Alice", ActivityKind::Visit, "Visiting: bbc.com");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["personaId"], "p1");
        assert_eq!(json["personaName"], "Alice");
        assert_eq!(json["type"], "visit");
        assert_eq!(json["details"], "Visiting: bbc.com");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn test_bus_fans_out_in_order() {
        let bus = EventBus::new();
        bus.emit(ActivityEvent::new("p", "P", ActivityKind::Start, "dropped"));

        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        bus.emit(ActivityEvent::new("p", "P", ActivityKind::Search, "one"));
        bus.emit(ActivityEvent::new("p", "P", ActivityKind::Visit, "two"));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().details, "one");
            assert_eq!(rx.recv().await.unwrap().details, "two");
        }
    }
}
