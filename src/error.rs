//! Error types surfaced by the game monitor

use crate::cancel::CancelReason;
use alloy::primitives::Address;
use thiserror::Error;

/// Failure of a whole discovery cycle. The cycle is abandoned and retried
/// after the next poll interval.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to load current block number: {0:#}")]
    BlockNumber(anyhow::Error),

    #[error("failed to load games: {0:#}")]
    LoadGames(anyhow::Error),
}

/// Failure isolated to a single game
#[derive(Debug, Error)]
pub enum GameError {
    #[error("failed to create agent for game {address}: {cause:#}")]
    Create { address: Address, cause: anyhow::Error },

    #[error("failed to progress game {address}: {cause:#}")]
    Progress { address: Address, cause: anyhow::Error },

    #[error("agent for game {address} panicked: {message}")]
    Panicked { address: Address, message: String },
}

impl GameError {
    pub fn address(&self) -> Address {
        match self {
            GameError::Create { address, .. }
            | GameError::Progress { address, .. }
            | GameError::Panicked { address, .. } => *address,
        }
    }
}

/// Returned by `GameMonitor::monitor_games` once its context fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("monitor cancelled: {reason}")]
pub struct Cancelled {
    pub reason: CancelReason,
}
