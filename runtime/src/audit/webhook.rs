//! Optional webhook forwarding: POST activity events to a remote endpoint.

use crate::runner::events::ActivityEvent;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const QUEUE_CAPACITY: usize = 1000;
const POST_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort forwarder. Events are dropped when the queue is full or the
/// endpoint fails.
pub struct WebhookForwarder {
    tx: mpsc::Sender<ActivityEvent>,
}

impl WebhookForwarder {
    /// Start a forwarder posting to `url`. Must be called inside a runtime.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);

        tokio::spawn(async move {
            post_loop(url, rx).await;
        });

        Self { tx }
    }

    /// A forwarder for the configured URL, if there is one.
    pub fn from_config(url: Option<&str>) -> Option<Self> {
        url.map(Self::new)
    }

    /// Queue an event without waiting.
    pub fn send(&self, event: ActivityEvent) {
        let _ = self.tx.try_send(event);
    }

    /// Forward every event from `rx` until the channel closes.
    pub fn forward_from(self, mut rx: broadcast::Receiver<ActivityEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.send(event),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

async fn post_loop(url: String, mut rx: mpsc::Receiver<ActivityEvent>) {
    let client = reqwest::Client::new();

    while let Some(event) = rx.recv().await {
        let result = client
            .post(&url)
            .json(&event)
            .timeout(POST_TIMEOUT)
            .send()
            .await;
        if let Err(e) = result {
            debug!("webhook delivery failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::events::{ActivityKind, EventBus};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_forwards_bus_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/events"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let bus = EventBus::new();
        let forwarder = WebhookForwarder::new(format!("{}/events", server.uri()));
        let _task = forwarder.forward_from(bus.subscribe());
        bus.emit(ActivityEvent::new("p1", "Alice", ActivityKind::Visit, "Visiting: npr.org"));

        let mut received = Vec::new();
        for _ in 0..100 {
            received = server.received_requests().await.unwrap_or_default();
            if !received.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(received.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["personaId"], "p1");
        assert_eq!(body["type"], "visit");
    }

    #[test]
    fn test_no_url_no_forwarder() {
        assert!(WebhookForwarder::from_config(None).is_none());
    }
}
