//! Swarm Core — durable task board, neural event bus, and consensus
//! channel for multi-agent swarm coordination.
//!
//! Three components compose a consistent pattern: durable state in a
//! file-locked store ([`services::board::TaskBoard`]), live notification
//! over an in-process pub/sub fabric ([`services::bus::Bus`]), and
//! cooperative decision-making via an append-only log
//! ([`services::consensus::SwarmNode`]). [`services::agent::SwarmAgent`]
//! and [`services::coordinator::Coordinator`] are the board's primary
//! consumers; [`services::hud::VisualHud`] and [`services::bridge::BusBridge`]
//! are the bus's.
//!
//! There is no process-wide singleton: a process may host many boards and
//! buses, constructed explicitly and wired together by the caller.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::error::{CoreError, CoreResult};
pub use domain::models::config::Config;
pub use services::{Bus, BusBridge, Coordinator, SwarmAgent, SwarmChannel, SwarmNode, TaskBoard, VisualHud};
