//! Subscription storage for the bus.
//!
//! Grounded on `systems/swarm/subscription_manager.py`: one collection
//! holding both topic and semantic subscriptions, tagged by mode, rather
//! than two parallel collections.

use uuid::Uuid;

use crate::domain::error::CoreError;
use crate::domain::models::signal::{Sink, SubscriptionMode, SubscriptionSummary};

use super::pattern::{cosine_similarity, topic_matches, validate_pattern};

/// One live subscription.
pub struct SubscriptionEntry {
    pub id: String,
    pub mode: SubscriptionMode,
    /// Required for `Topic` subscriptions; an optional narrowing filter for
    /// `Semantic` ones.
    pub pattern: Option<String>,
    pub ref_embedding: Option<Vec<f32>>,
    pub threshold: Option<f32>,
    pub sink: Sink,
}

/// A plain, un-synchronized collection of subscriptions. [`super::Bus`] owns
/// the locking.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Vec<SubscriptionEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a topic-pattern subscription, returning its id.
    pub fn subscribe(&mut self, pattern: &str, sink: Sink) -> Result<String, CoreError> {
        validate_pattern(pattern)?;
        let id = Uuid::new_v4().to_string();
        self.entries.push(SubscriptionEntry {
            id: id.clone(),
            mode: SubscriptionMode::Topic,
            pattern: Some(pattern.to_string()),
            ref_embedding: None,
            threshold: None,
            sink,
        });
        Ok(id)
    }

    /// Register a semantic subscription, optionally narrowed by a topic
    /// pattern filter.
    pub fn subscribe_semantic(
        &mut self,
        ref_embedding: Vec<f32>,
        sink: Sink,
        threshold: f32,
        pattern: Option<String>,
    ) -> Result<String, CoreError> {
        if let Some(p) = &pattern {
            validate_pattern(p)?;
        }
        let id = Uuid::new_v4().to_string();
        self.entries.push(SubscriptionEntry {
            id: id.clone(),
            mode: SubscriptionMode::Semantic,
            pattern,
            ref_embedding: Some(ref_embedding),
            threshold: Some(threshold.clamp(0.0, 1.0)),
            sink,
        });
        Ok(id)
    }

    /// Drop the subscription with `id`, if present. Unknown ids return
    /// `false`, not an error.
    pub fn unsubscribe(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn list(&self) -> Vec<SubscriptionSummary> {
        self.entries
            .iter()
            .map(|e| SubscriptionSummary {
                id: e.id.clone(),
                pattern: e.pattern.clone(),
                mode: match e.mode {
                    SubscriptionMode::Topic => "TOPIC",
                    SubscriptionMode::Semantic => "SEMANTIC",
                },
            })
            .collect()
    }

    /// Sinks for topic-pattern subscriptions whose pattern matches `topic`,
    /// in subscription order.
    pub fn matching_topic_sinks(&self, topic: &str) -> Vec<Sink> {
        self.entries
            .iter()
            .filter(|e| e.mode == SubscriptionMode::Topic)
            .filter(|e| {
                e.pattern
                    .as_deref()
                    .is_some_and(|p| topic_matches(p, topic))
            })
            .map(|e| e.sink.clone())
            .collect()
    }

    /// Sinks for semantic subscriptions matching `topic`/`embedding`.
    ///
    /// Entries whose `ref_embedding` dimension differs from `embedding`'s are
    /// skipped for this signal only; their ids are reported back via
    /// `mismatches` so the publisher can be told via a `DIMENSION_MISMATCH`
    /// response.
    pub fn matching_semantic_sinks(
        &self,
        topic: &str,
        embedding: &[f32],
        mismatches: &mut Vec<(String, usize, usize)>,
    ) -> Vec<Sink> {
        self.entries
            .iter()
            .filter(|e| e.mode == SubscriptionMode::Semantic)
            .filter(|e| {
                e.pattern
                    .as_deref()
                    .is_none_or(|p| topic_matches(p, topic))
            })
            .filter_map(|e| {
                let reference = e.ref_embedding.as_ref()?;
                if reference.len() != embedding.len() {
                    mismatches.push((e.id.clone(), reference.len(), embedding.len()));
                    return None;
                }
                let threshold = e.threshold.unwrap_or(0.0);
                if cosine_similarity(reference, embedding) >= threshold {
                    Some(e.sink.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}
