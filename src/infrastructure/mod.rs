//! Infrastructure layer: adapters for concerns that sit outside the
//! coordination core itself (configuration loading, logging setup).
//!
//! The core's own durable state — the task board's files, the consensus
//! log — is handled directly by `crate::services`; there is no database
//! adapter here, the board's storage format is itself the persistence
//! boundary.

pub mod config;
pub mod logging;
