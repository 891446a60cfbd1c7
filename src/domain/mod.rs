//! Domain layer: pure data and error types shared by every service.
//!
//! Contains no I/O and no async runtime dependency; the service layer
//! (`crate::services`) operates on these models.

pub mod error;
pub mod models;

pub use error::{CoreError, CoreResult};
