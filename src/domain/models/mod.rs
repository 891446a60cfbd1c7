//! Domain models
//!
//! Pure domain entities with business logic and validation rules.
//! These models are framework-agnostic and contain no infrastructure concerns.

pub mod config;
pub mod consensus;
pub mod signal;
pub mod task;

pub use config::{BoardConfig, BridgeConfig, BusConfig, Config, ConsensusConfig};
pub use consensus::{EvaluationResult, Proposal, ProposalStatus, Vote};
pub use signal::{Signal, Sink, SubscriptionMode, SubscriptionSummary};
pub use task::{PayloadMap, Task, TaskStatus};
