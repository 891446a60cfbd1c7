//! Neural Event Bus: an in-process publish/subscribe fabric with
//! hierarchical topic routing and optional vector-similarity subscriptions.
//!
//! Grounded on `systems/swarm/neb_bus.py` and
//! `systems/swarm/subscription_manager.py`.

pub mod pattern;
pub mod registry;

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::Map;

use crate::domain::error::CoreResult;
use crate::domain::models::signal::{Signal, Sink, SubscriptionSummary};
use crate::domain::models::task::epoch_now;

use self::pattern::validate_topic;
use self::registry::SubscriptionRegistry;

/// Public façade over a [`SubscriptionRegistry`]: constructs signals, keeps a
/// bounded history, and dispatches to matching subscribers.
pub struct Bus {
    node_id: String,
    registry: Mutex<SubscriptionRegistry>,
    history: Mutex<VecDeque<Signal>>,
    history_limit: usize,
    /// Serializes the match-and-deliver phase of `publish` so per-source
    /// publish order is preserved; a single global delivery lock satisfies
    /// that trivially at the cost of cross-source delivery parallelism, a
    /// deliberate simplification recorded in DESIGN.md.
    delivery: Mutex<()>,
}

impl Bus {
    /// Construct a bus that stamps published signals with `node_id` and
    /// retains the last `history_limit` of them.
    pub fn new(node_id: impl Into<String>, history_limit: usize) -> Self {
        Self {
            node_id: node_id.into(),
            registry: Mutex::new(SubscriptionRegistry::new()),
            history: Mutex::new(VecDeque::with_capacity(history_limit)),
            history_limit,
            delivery: Mutex::new(()),
        }
    }

    /// Register a topic-pattern subscription.
    pub fn subscribe(&self, pattern: &str, sink: Sink) -> CoreResult<String> {
        self.registry
            .lock()
            .expect("bus registry lock poisoned")
            .subscribe(pattern, sink)
    }

    /// Register a semantic subscription, optionally narrowed by a topic
    /// pattern filter.
    pub fn subscribe_semantic(
        &self,
        ref_embedding: Vec<f32>,
        sink: Sink,
        threshold: f32,
        pattern: Option<String>,
    ) -> CoreResult<String> {
        self.registry
            .lock()
            .expect("bus registry lock poisoned")
            .subscribe_semantic(ref_embedding, sink, threshold, pattern)
    }

    /// Remove a subscription. Unknown ids return `false`, not an error.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.registry
            .lock()
            .expect("bus registry lock poisoned")
            .unsubscribe(id)
    }

    pub fn list_subscriptions(&self) -> Vec<SubscriptionSummary> {
        self.registry
            .lock()
            .expect("bus registry lock poisoned")
            .list()
    }

    /// The most recent `limit` signals, newest last.
    pub fn recent_signals(&self, limit: usize) -> Vec<Signal> {
        let history = self.history.lock().expect("bus history lock poisoned");
        history.iter().rev().take(limit).rev().cloned().collect()
    }

    /// Publish a signal, delivering to every matching subscriber
    /// synchronously before returning.
    ///
    /// Topic subscriptions are always evaluated; semantic subscriptions are
    /// additionally evaluated when `embedding` is present. No subscriber is
    /// invoked twice for the same signal.
    pub fn publish(
        &self,
        topic: &str,
        payload: Map<String, serde_json::Value>,
        embedding: Option<Vec<f32>>,
    ) -> CoreResult<Signal> {
        validate_topic(topic)?;

        let signal = Signal {
            source_id: self.node_id.clone(),
            topic: topic.to_string(),
            payload,
            embedding,
            timestamp: epoch_now(),
        };

        {
            let mut history = self.history.lock().expect("bus history lock poisoned");
            history.push_back(signal.clone());
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }

        let _delivery_guard = self.delivery.lock().expect("bus delivery lock poisoned");

        let (topic_sinks, semantic_sinks) = {
            let registry = self.registry.lock().expect("bus registry lock poisoned");
            let topic_sinks = registry.matching_topic_sinks(&signal.topic);
            let semantic_sinks = if let Some(embedding) = &signal.embedding {
                let mut mismatches = Vec::new();
                let sinks =
                    registry.matching_semantic_sinks(&signal.topic, embedding, &mut mismatches);
                for (id, expected, actual) in mismatches {
                    tracing::warn!(
                        subscription = %id,
                        expected,
                        actual,
                        "dropping signal for subscription: embedding dimension mismatch"
                    );
                }
                sinks
            } else {
                Vec::new()
            };
            (topic_sinks, semantic_sinks)
        };

        for sink in topic_sinks.into_iter().chain(semantic_sinks) {
            invoke_sink(&sink, &signal);
        }

        Ok(signal)
    }
}

/// Invoke a subscriber, isolating the rest of delivery from both a returned
/// error and a panic inside the callback.
fn invoke_sink(sink: &Sink, signal: &Signal) {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink(signal)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, topic = %signal.topic, "bus subscriber failed"),
        Err(_) => tracing::warn!(topic = %signal.topic, "bus subscriber panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn recording_sink() -> (Sink, Arc<StdMutex<Vec<String>>>) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let recorded = Arc::clone(&log);
        let sink: Sink = Arc::new(move |signal| {
            recorded.lock().unwrap().push(signal.topic.clone());
            Ok(())
        });
        (sink, log)
    }

    #[test]
    fn wildcard_routing_matches_prefix_and_exact_patterns() {
        let bus = Bus::new("node-a", 100);
        let (sink_a, log_a) = recording_sink();
        let (sink_b, log_b) = recording_sink();
        bus.subscribe("task.**", sink_a).unwrap();
        bus.subscribe("task.claimed", sink_b).unwrap();

        bus.publish("task.available", Map::new(), None).unwrap();
        bus.publish("task.claimed", Map::new(), None).unwrap();
        bus.publish("task.completed", Map::new(), None).unwrap();
        bus.publish("build.success", Map::new(), None).unwrap();

        assert_eq!(
            *log_a.lock().unwrap(),
            vec!["task.available", "task.claimed", "task.completed"]
        );
        assert_eq!(*log_b.lock().unwrap(), vec!["task.claimed"]);
    }

    #[test]
    fn publish_rejects_wildcard_topics() {
        let bus = Bus::new("node-a", 100);
        let err = bus.publish("task.*", Map::new(), None).unwrap_err();
        assert!(matches!(err, crate::domain::error::CoreError::InvalidPattern(_)));
    }

    #[test]
    fn history_is_bounded_by_the_configured_limit() {
        let bus = Bus::new("node-a", 3);
        for i in 0..10 {
            bus.publish(&format!("t.{i}"), Map::new(), None).unwrap();
        }
        assert_eq!(bus.recent_signals(100).len(), 3);
        let topics: Vec<_> = bus.recent_signals(100).iter().map(|s| s.topic.clone()).collect();
        assert_eq!(topics, vec!["t.7", "t.8", "t.9"]);
    }

    #[test]
    fn unsubscribe_stops_future_deliveries() {
        let bus = Bus::new("node-a", 10);
        let (sink, log) = recording_sink();
        let id = bus.subscribe("t.a", sink).unwrap();
        bus.publish("t.a", Map::new(), None).unwrap();
        assert!(bus.unsubscribe(&id));
        bus.publish("t.a", Map::new(), None).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn a_panicking_subscriber_does_not_block_the_rest() {
        let bus = Bus::new("node-a", 10);
        let panicking: Sink = Arc::new(|_signal| panic!("boom"));
        let (sink, log) = recording_sink();
        bus.subscribe("t.a", panicking).unwrap();
        bus.subscribe("t.a", sink).unwrap();
        bus.publish("t.a", Map::new(), None).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn semantic_subscription_requires_embedding_on_the_signal() {
        let bus = Bus::new("node-a", 10);
        let (sink, log) = recording_sink();
        bus.subscribe_semantic(vec![1.0, 0.0], sink, 0.5, None)
            .unwrap();
        bus.publish("t.a", Map::new(), None).unwrap();
        assert!(log.lock().unwrap().is_empty());
        bus.publish("t.a", Map::new(), Some(vec![1.0, 0.0])).unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }
}
