//! Root configuration for a swarm coordination process.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::infrastructure::logging::config::LogConfig;

/// Top-level configuration, merged hierarchically by
/// [`crate::infrastructure::config::loader::ConfigLoader`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub board: BoardConfig,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub consensus: ConsensusConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            bus: BusConfig::default(),
            bridge: BridgeConfig::default(),
            consensus: ConsensusConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Where the [`crate::services::board::TaskBoard`] stores task files and its
/// lock file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BoardConfig {
    #[serde(default = "default_board_root")]
    pub root: PathBuf,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            root: default_board_root(),
        }
    }
}

fn default_board_root() -> PathBuf {
    PathBuf::from(".swarm/board")
}

/// Tuning for the [`crate::services::bus::Bus`]'s in-memory history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BusConfig {
    /// Size of the bounded ring buffer of recent signals.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
        }
    }
}

const fn default_history_size() -> usize {
    100
}

/// Tuning for the [`crate::services::bridge::BusBridge`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Minimum milliseconds between broadcasts.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Maximum number of buffered events carried in one broadcast payload.
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            max_events: default_max_events(),
        }
    }
}

const fn default_throttle_ms() -> u64 {
    100
}

const fn default_max_events() -> usize {
    10
}

/// Tuning for [`crate::services::consensus::SwarmNode`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConsensusConfig {
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Default approval threshold used when a caller does not supply one to
    /// `EvaluateProposal`.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            default_threshold: default_threshold(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from(".swarm/consensus.log")
}

const fn default_threshold() -> f64 {
    0.6
}
