//! Bus Bridge: throttled broadcaster of bus summaries to a boundary
//! transport (e.g. the Visual HUD's transport layer).
//!
//! Grounded on `systems/visual_shell/api/neb_bridge.py`'s `NEBBridge`: a
//! `**` subscription that buffers events and topic counts, drained by a
//! periodic broadcast loop throttled to a minimum interval. The broadcast
//! payload uses `EVENT_UPDATE` with `payload_preview` truncated to 53
//! characters total (50 characters plus a 3-character ellipsis).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::error::CoreResult;
use crate::domain::models::signal::Signal;
use crate::domain::models::task::epoch_now;
use crate::services::bus::Bus;

/// A boundary transport the bridge periodically broadcasts summaries to.
///
/// Implemented by hosts (a websocket hub, a test double); the core never
/// assumes a concrete transport.
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// Deliver one broadcast payload. Errors are logged, never propagated
    /// back into the bus: a malformed or unreachable transport must not
    /// terminate the bridge.
    async fn broadcast(&self, payload: Value) -> CoreResult<()>;
}

/// A trimmed preview of one bus event, as included in a broadcast payload.
#[derive(Debug, Clone, Serialize)]
struct EventPreview {
    topic: String,
    source_id: String,
    timestamp: f64,
    payload_preview: String,
}

const PREVIEW_LIMIT: usize = 50;

fn truncate_payload(payload: &serde_json::Map<String, Value>) -> String {
    let rendered = Value::Object(payload.clone()).to_string();
    if rendered.chars().count() > PREVIEW_LIMIT {
        let truncated: String = rendered.chars().take(PREVIEW_LIMIT).collect();
        format!("{truncated}...")
    } else {
        rendered
    }
}

struct State {
    events: Vec<EventPreview>,
    topic_counts: HashMap<String, u64>,
    total_count: u64,
}

/// Subscribes to `**` on a [`Bus`] and periodically broadcasts a throttled
/// summary to a [`BridgeTransport`].
pub struct BusBridge {
    throttle_ms: u64,
    max_events: usize,
    state: Mutex<State>,
    transport: Arc<dyn BridgeTransport>,
    running: AtomicBool,
}

impl BusBridge {
    /// Subscribe a new bridge to `bus`, returning it alongside the
    /// subscription id.
    pub fn attach(
        bus: &Arc<Bus>,
        transport: Arc<dyn BridgeTransport>,
        throttle_ms: u64,
        max_events: usize,
    ) -> CoreResult<(Arc<Self>, String)> {
        let bridge = Arc::new(Self {
            throttle_ms,
            max_events,
            state: Mutex::new(State {
                events: Vec::new(),
                topic_counts: HashMap::new(),
                total_count: 0,
            }),
            transport,
            running: AtomicBool::new(true),
        });

        let observer = Arc::clone(&bridge);
        let subscription_id = bus.subscribe(
            "**",
            Arc::new(move |signal: &Signal| {
                observer.on_event(signal);
                Ok(())
            }),
        )?;

        Ok((bridge, subscription_id))
    }

    fn on_event(&self, signal: &Signal) {
        let mut state = self.state.lock().expect("bridge state lock poisoned");

        state.events.push(EventPreview {
            topic: signal.topic.clone(),
            source_id: signal.source_id.clone(),
            timestamp: signal.timestamp,
            payload_preview: truncate_payload(&signal.payload),
        });
        if state.events.len() > self.max_events {
            let overflow = state.events.len() - self.max_events;
            state.events.drain(0..overflow);
        }

        let prefix = signal
            .topic
            .split('.')
            .next()
            .unwrap_or(&signal.topic)
            .to_string();
        *state.topic_counts.entry(prefix).or_insert(0) += 1;
        state.total_count += 1;
    }

    /// Stop the broadcast loop started by [`Self::run`]. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run the throttled broadcast loop until [`Self::stop`] is called.
    ///
    /// Each tick sleeps `throttle_ms`, then broadcasts a summary only if at
    /// least one event arrived since the last broadcast. The events buffer
    /// is cleared after a successful broadcast; topic counts are cumulative
    /// for the bridge's lifetime and are never cleared.
    pub async fn run(self: &Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(self.throttle_ms)).await;
            self.broadcast_once().await;
        }
    }

    /// Broadcast one summary immediately if events are buffered. Exposed
    /// separately from [`Self::run`] so tests and hosts driving their own
    /// schedule can call it directly.
    pub async fn broadcast_once(&self) {
        let payload = {
            let mut state = self.state.lock().expect("bridge state lock poisoned");
            if state.events.is_empty() {
                return;
            }
            let payload = json!({
                "type": "EVENT_UPDATE",
                "data": {
                    "events": state.events,
                    "topicCounts": state.topic_counts,
                    "totalCount": state.total_count,
                    "timestamp": epoch_now(),
                }
            });
            state.events.clear();
            payload
        };

        if let Err(e) = self.transport.broadcast(payload).await {
            tracing::warn!(error = %e, "bus bridge transport failed");
        }
    }

    /// Snapshot of the bridge's cumulative counters, for diagnostics.
    pub fn total_count(&self) -> u64 {
        self.state.lock().expect("bridge state lock poisoned").total_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::Mutex as StdMutex;
    use tokio::time::advance;

    struct RecordingTransport {
        payloads: StdMutex<Vec<Value>>,
    }

    #[async_trait]
    impl BridgeTransport for RecordingTransport {
        async fn broadcast(&self, payload: Value) -> CoreResult<()> {
            self.payloads.lock().unwrap().push(payload);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_caps_broadcasts_within_the_window() {
        let bus = Arc::new(Bus::new("node-a", 200));
        let transport = Arc::new(RecordingTransport {
            payloads: StdMutex::new(Vec::new()),
        });
        let (bridge, _sub) = BusBridge::attach(&bus, transport.clone(), 100, 10).unwrap();

        let runner = Arc::clone(&bridge);
        let handle = tokio::spawn(async move { runner.run().await });

        for i in 0..20 {
            bus.publish(&format!("task.event{i}"), Map::new(), None).unwrap();
            advance(Duration::from_millis(5)).await;
        }
        advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;

        bridge.stop();
        let _ = handle.await;

        let payloads = transport.payloads.lock().unwrap();
        assert!(payloads.len() <= 2, "expected at most two broadcasts, got {}", payloads.len());
        assert_eq!(bridge.total_count(), 20);
    }

    #[tokio::test]
    async fn events_buffer_clears_but_topic_counts_stay_cumulative() {
        let bus = Arc::new(Bus::new("node-a", 200));
        let transport = Arc::new(RecordingTransport {
            payloads: StdMutex::new(Vec::new()),
        });
        let (bridge, _sub) = BusBridge::attach(&bus, transport, 100, 10).unwrap();

        bus.publish("task.a", Map::new(), None).unwrap();
        bus.publish("task.b", Map::new(), None).unwrap();
        bridge.broadcast_once().await;
        assert_eq!(bridge.total_count(), 2);

        bus.publish("build.c", Map::new(), None).unwrap();
        bridge.broadcast_once().await;
        assert_eq!(bridge.total_count(), 3);
    }

    #[test]
    fn payload_preview_truncates_at_fifty_chars_plus_ellipsis() {
        let mut payload = Map::new();
        payload.insert(
            "description".into(),
            Value::String("x".repeat(80)),
        );
        let preview = truncate_payload(&payload);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_LIMIT + 3);
    }
}
