//! Bus events and subscriptions for the neural event bus.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::CoreResult;

/// An immutable event published on a [`crate::services::bus::Bus`].
///
/// Reference-only: subscribers receive a shared borrow and must not mutate
/// it. Once published, a `Signal`'s fields never change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub source_id: String,

    /// Dot-separated lowercase ASCII segments, e.g. `task.available`.
    pub topic: String,

    pub payload: Map<String, Value>,

    /// Present only on signals published with an embedding.
    pub embedding: Option<Vec<f32>>,

    /// Unix epoch seconds.
    pub timestamp: f64,
}

/// A subscriber capability invoked synchronously during `Publish`.
///
/// Callback failures are caught and logged rather than propagated, so one
/// misbehaving subscriber cannot block delivery to the rest.
pub type Sink = Arc<dyn Fn(&Signal) -> CoreResult<()> + Send + Sync>;

/// How a [`crate::services::bus::registry::SubscriptionEntry`] selects
/// signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Matched by topic pattern only.
    Topic,
    /// Matched by cosine similarity to a reference embedding, optionally
    /// narrowed by a topic pattern filter.
    Semantic,
}

/// A lightweight, serializable description of a live subscription, as
/// returned by `ListSubscriptions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionSummary {
    pub id: String,
    pub pattern: Option<String>,
    pub mode: &'static str,
}
