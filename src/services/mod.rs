//! Service layer: the coordination core's three components (TaskBoard, NEB
//! Bus, Consensus Channel) and their always-on consumers (SwarmAgent,
//! Coordinator, Visual HUD Tap, Bus Bridge).
//!
//! Pure domain types live in `crate::domain::models`; everything here does
//! I/O (file locking, bus delivery, broadcast transports).

pub mod agent;
pub mod board;
pub mod bridge;
pub mod bus;
pub mod consensus;
pub mod coordinator;
pub mod hud;

pub use agent::SwarmAgent;
pub use board::TaskBoard;
pub use bridge::BusBridge;
pub use bus::Bus;
pub use consensus::{SwarmChannel, SwarmNode};
pub use coordinator::Coordinator;
pub use hud::VisualHud;
