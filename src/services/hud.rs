//! Visual HUD Tap: derives ripple and glow visualization streams from every
//! bus event.
//!
//! Grounded line-for-line on `systems/swarm/neb_visual_hud.py`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::domain::error::CoreResult;
use crate::domain::models::signal::Signal;
use crate::domain::models::task::epoch_now;
use crate::services::bus::Bus;

/// An expanding, fading circle created for one bus event.
#[derive(Debug, Clone, Serialize)]
pub struct Ripple {
    pub topic: String,
    pub source_id: String,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub max_radius: f64,
    pub opacity: f64,
    pub created_at: f64,
    pub expansion_rate: f64,
}

impl Ripple {
    fn new(topic: String, source_id: String, x: f64, y: f64, created_at: f64) -> Self {
        Self {
            topic,
            source_id,
            x,
            y,
            radius: 0.0,
            max_radius: 100.0,
            opacity: 1.0,
            created_at,
            expansion_rate: 50.0,
        }
    }

    fn update(&mut self, now: f64) {
        let elapsed = now - self.created_at;
        self.radius = (self.expansion_rate * elapsed).min(self.max_radius);
        self.opacity = if self.max_radius > 0.0 {
            (1.0 - self.radius / self.max_radius).max(0.0)
        } else {
            0.0
        };
    }
}

/// An agent's activity glow, indexed by `payload.agent_id`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentGlow {
    pub agent_id: String,
    pub intensity: f64,
    pub topic_type: String,
    pub decay_rate: f64,
    pub last_activity: f64,
}

/// A trimmed record of one bus event, kept for the activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub topic: String,
    pub source_id: String,
    pub payload: Map<String, Value>,
    pub timestamp: f64,
}

struct State {
    events: Vec<EventRecord>,
    ripples: Vec<Ripple>,
    glows: HashMap<String, AgentGlow>,
}

/// Subscribes to `**` on a [`Bus`] and exposes ripple/glow/event-feed
/// visualization data derived from every event observed.
pub struct VisualHud {
    max_events: usize,
    state: Mutex<State>,
}

impl VisualHud {
    /// Subscribe a new HUD to `bus`, returning it alongside the subscription
    /// id (useful for unsubscribing the HUD later).
    pub fn attach(bus: &Arc<Bus>, max_events: usize) -> CoreResult<(Arc<Self>, String)> {
        let hud = Arc::new(Self {
            max_events,
            state: Mutex::new(State {
                events: Vec::new(),
                ripples: Vec::new(),
                glows: HashMap::new(),
            }),
        });

        let observer = Arc::clone(&hud);
        let subscription_id = bus.subscribe(
            "**",
            Arc::new(move |signal: &Signal| {
                observer.on_event(signal);
                Ok(())
            }),
        )?;

        Ok((hud, subscription_id))
    }

    fn on_event(&self, signal: &Signal) {
        let now = epoch_now();
        let mut state = self.state.lock().expect("hud state lock poisoned");

        state.events.push(EventRecord {
            topic: signal.topic.clone(),
            source_id: signal.source_id.clone(),
            payload: signal.payload.clone(),
            timestamp: signal.timestamp,
        });
        if state.events.len() > self.max_events {
            let overflow = state.events.len() - self.max_events;
            state.events.drain(0..overflow);
        }

        let x = signal.payload.get("x").and_then(Value::as_f64).unwrap_or(0.0);
        let y = signal.payload.get("y").and_then(Value::as_f64).unwrap_or(0.0);
        state
            .ripples
            .push(Ripple::new(signal.topic.clone(), signal.source_id.clone(), x, y, now));

        if let Some(agent_id) = signal.payload.get("agent_id").and_then(Value::as_str) {
            let topic_type = signal
                .topic
                .split('.')
                .next()
                .unwrap_or(&signal.topic)
                .to_string();
            state
                .glows
                .entry(agent_id.to_string())
                .and_modify(|glow| {
                    glow.intensity = (glow.intensity + 1.0).min(10.0);
                    glow.topic_type = topic_type.clone();
                    glow.last_activity = now;
                })
                .or_insert_with(|| AgentGlow {
                    agent_id: agent_id.to_string(),
                    intensity: 1.0,
                    topic_type,
                    decay_rate: 0.5,
                    last_activity: now,
                });
        }
    }

    /// The most recent `limit` events, oldest first.
    pub fn recent_events(&self, limit: usize) -> Vec<EventRecord> {
        let state = self.state.lock().expect("hud state lock poisoned");
        let start = state.events.len().saturating_sub(limit);
        state.events[start..].to_vec()
    }

    /// Active ripples, dropping any older than `max_age` seconds and
    /// advancing the rest to the current time.
    pub fn ripples(&self, max_age: f64) -> Vec<Ripple> {
        let now = epoch_now();
        let mut state = self.state.lock().expect("hud state lock poisoned");
        state.ripples.retain(|r| now - r.created_at < max_age);
        for ripple in &mut state.ripples {
            ripple.update(now);
        }
        state.ripples.clone()
    }

    /// Active agent glows, decayed to the current time. Glows that decay
    /// below `0.01` are dropped.
    pub fn agent_glows(&self) -> Vec<AgentGlow> {
        let now = epoch_now();
        let mut state = self.state.lock().expect("hud state lock poisoned");
        state.glows.retain(|_, glow| {
            let elapsed = now - glow.last_activity;
            let decayed = (glow.intensity - glow.decay_rate * elapsed).max(0.0);
            glow.intensity = decayed;
            decayed > 0.01
        });
        state.glows.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_without_position_ripples_at_the_default_origin() {
        let bus = Arc::new(Bus::new("node-a", 100));
        let (hud, _sub) = VisualHud::attach(&bus, 100).unwrap();
        bus.publish("task.available", Map::new(), None).unwrap();

        let ripples = hud.ripples(2.0);
        assert_eq!(ripples.len(), 1);
        assert_eq!((ripples[0].x, ripples[0].y), (0.0, 0.0));
    }

    #[test]
    fn glow_intensity_accumulates_per_agent_and_caps_at_ten() {
        let bus = Arc::new(Bus::new("node-a", 100));
        let (hud, _sub) = VisualHud::attach(&bus, 100).unwrap();

        for _ in 0..15 {
            let mut payload = Map::new();
            payload.insert("agent_id".into(), Value::String("agent-1".into()));
            bus.publish("task.claimed", payload, None).unwrap();
        }

        let glows = hud.agent_glows();
        assert_eq!(glows.len(), 1);
        assert_eq!(glows[0].intensity, 10.0);
        assert_eq!(glows[0].topic_type, "task");
    }

    #[test]
    fn event_feed_is_bounded_by_max_events() {
        let bus = Arc::new(Bus::new("node-a", 100));
        let (hud, _sub) = VisualHud::attach(&bus, 3).unwrap();
        for i in 0..10 {
            bus.publish(&format!("t.{i}"), Map::new(), None).unwrap();
        }
        assert_eq!(hud.recent_events(100).len(), 3);
    }
}
