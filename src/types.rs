//! Core types for the dispute game monitor

use alloy::primitives::Address;
use std::fmt;

/// Position in the L1 chain that scopes which games are visible
pub type BlockNumber = u64;

/// A dispute game as reported by the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameRecord {
    /// Game type identifier (e.g. 0 = cannon, 255 = alphabet test game)
    pub game_type: u8,
    /// Creation timestamp of the game (unix seconds)
    pub timestamp: u64,
    /// Address of the game proxy contract. Unique per game.
    pub address: Address,
}

impl GameRecord {
    pub fn new(address: Address) -> Self {
        Self {
            game_type: 0,
            timestamp: 0,
            address,
        }
    }
}

impl fmt::Display for GameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (type {}, created {})",
            self.address, self.game_type, self.timestamp
        )
    }
}

/// On-chain status of a dispute game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameStatus {
    InProgress,
    ChallengerWins,
    DefenderWins,
}

impl GameStatus {
    /// Whether the game has been resolved and will no longer change
    pub fn is_resolved(&self) -> bool {
        !matches!(self, GameStatus::InProgress)
    }
}

impl TryFrom<u8> for GameStatus {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameStatus::InProgress),
            1 => Ok(GameStatus::ChallengerWins),
            2 => Ok(GameStatus::DefenderWins),
            other => anyhow::bail!("unknown game status {}", other),
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::InProgress => write!(f, "IN_PROGRESS"),
            GameStatus::ChallengerWins => write!(f, "CHALLENGER_WINS"),
            GameStatus::DefenderWins => write!(f, "DEFENDER_WINS"),
        }
    }
}
