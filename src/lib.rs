//! Fault Dispute Game Monitor Library
//!
//! Tracks the dispute games created by an L1 dispute game factory and keeps
//! one agent per game progressing:
//!
//! 1. **Discovery**: every cycle reads the head block and lists all games the
//!    factory reports at that block.
//! 2. **Progress**: each listed game's agent is created on first sighting,
//!    cached, and asked to make one step of progress.
//!
//! Failures of a single game are logged and isolated; only cancellation stops
//! the loop.

pub mod cancel;
pub mod config;
pub mod error;
pub mod monitor;
pub mod services;
pub mod types;

pub use cancel::{cancel_pair, CancelContext, CancelReason, Canceller};
pub use config::Config;
pub use error::{Cancelled, GameError, MonitorError};
pub use monitor::{
    AgentFactory, BlockNumberSource, CycleSummary, GameAgent, GameMonitor, GameSource,
};
pub use types::{BlockNumber, GameRecord, GameStatus};
