//! Fault Dispute Game Monitor
//!
//! Discovers the games the factory reports at the current block, keeps exactly
//! one agent per game alive across polling cycles and asks every listed agent
//! to make progress once per cycle. A failing game is logged and skipped; it
//! never stops the other games or the loop.

use crate::cancel::CancelContext;
use crate::error::{Cancelled, GameError, MonitorError};
use crate::types::{BlockNumber, GameRecord};
use alloy::primitives::Address;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Wait between two polling cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Local logic for a single dispute game
#[async_trait]
pub trait GameAgent: Send {
    /// Advance the game by one step. Returns whether any work was done.
    async fn progress_game(&mut self, ctx: &CancelContext) -> anyhow::Result<bool>;
}

/// Builds the agent for a newly discovered game
pub trait AgentFactory: Send {
    fn create_agent(&mut self, address: Address) -> anyhow::Result<Box<dyn GameAgent>>;
}

impl<F> AgentFactory for F
where
    F: FnMut(Address) -> anyhow::Result<Box<dyn GameAgent>> + Send,
{
    fn create_agent(&mut self, address: Address) -> anyhow::Result<Box<dyn GameAgent>> {
        self(address)
    }
}

/// Reports the current L1 block number
#[async_trait]
pub trait BlockNumberSource: Send + Sync {
    async fn fetch_block_number(&self, ctx: &CancelContext) -> anyhow::Result<BlockNumber>;
}

#[async_trait]
impl<T: BlockNumberSource + ?Sized> BlockNumberSource for Arc<T> {
    async fn fetch_block_number(&self, ctx: &CancelContext) -> anyhow::Result<BlockNumber> {
        (**self).fetch_block_number(ctx).await
    }
}

/// Lists every game known as of a block
#[async_trait]
pub trait GameSource: Send + Sync {
    async fn fetch_all_games_at_block(
        &self,
        ctx: &CancelContext,
        block: BlockNumber,
    ) -> anyhow::Result<Vec<GameRecord>>;
}

/// Outcome of one successful discovery cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub block: BlockNumber,
    /// Games reported by the source
    pub listed: usize,
    /// Agents that reported doing work
    pub progressed: usize,
    /// Games whose agent could not be created or progressed
    pub failed: usize,
}

/// Owns the polling loop and the address -> agent cache.
///
/// Agents are never evicted, so the cache grows with every game ever listed.
pub struct GameMonitor {
    block_source: Box<dyn BlockNumberSource>,
    game_source: Box<dyn GameSource>,
    factory: Box<dyn AgentFactory>,
    games: HashMap<Address, Box<dyn GameAgent>>,
    poll_interval: Duration,
}

impl GameMonitor {
    pub fn new(
        block_source: Box<dyn BlockNumberSource>,
        game_source: Box<dyn GameSource>,
        factory: Box<dyn AgentFactory>,
    ) -> Self {
        Self {
            block_source,
            game_source,
            factory,
            games: HashMap::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Addresses with a cached agent
    pub fn tracked_games(&self) -> impl Iterator<Item = &Address> {
        self.games.keys()
    }

    pub fn is_tracking(&self, address: &Address) -> bool {
        self.games.contains_key(address)
    }

    /// Run until `ctx` is cancelled.
    ///
    /// Cancellation is only observed while waiting between cycles: a cycle
    /// that is already running completes first.
    pub async fn monitor_games(mut self, ctx: CancelContext) -> Cancelled {
        info!("Monitoring fault dispute games");

        loop {
            if let Err(e) = self.progress_games(&ctx).await {
                error!(error = %e, "Failed to progress games");
            }

            tokio::select! {
                biased;
                reason = ctx.cancelled() => {
                    info!(%reason, tracked = self.games.len(), "Stopped monitoring games");
                    return Cancelled { reason };
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// One discovery-and-progress cycle.
    ///
    /// Only discovery failures fail the cycle. Per-game failures are logged
    /// and counted in the summary.
    pub async fn progress_games(
        &mut self,
        ctx: &CancelContext,
    ) -> Result<CycleSummary, MonitorError> {
        let block = self
            .block_source
            .fetch_block_number(ctx)
            .await
            .map_err(MonitorError::BlockNumber)?;

        let games = self
            .game_source
            .fetch_all_games_at_block(ctx, block)
            .await
            .map_err(MonitorError::LoadGames)?;

        let mut summary = CycleSummary {
            block,
            listed: games.len(),
            ..Default::default()
        };

        for game in &games {
            match self.progress_game(ctx, game).await {
                Ok(true) => summary.progressed += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.failed += 1;
                    error!(game = %e.address(), error = %e, "Error while progressing game");
                }
            }
        }

        debug!(
            block,
            listed = summary.listed,
            progressed = summary.progressed,
            failed = summary.failed,
            tracked = self.games.len(),
            "Progressed games"
        );
        Ok(summary)
    }

    /// Resolve the cached agent for `game`, creating it on first sighting, and
    /// progress it once. A failed creation is not cached so the next cycle
    /// tries again.
    async fn progress_game(
        &mut self,
        ctx: &CancelContext,
        game: &GameRecord,
    ) -> Result<bool, GameError> {
        let address = game.address;
        let agent = match self.games.entry(address) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let agent = self
                    .factory
                    .create_agent(address)
                    .map_err(|cause| GameError::Create { address, cause })?;
                debug!(game = %address, game_type = game.game_type, "Tracking new game");
                entry.insert(agent)
            }
        };

        match AssertUnwindSafe(agent.progress_game(ctx)).catch_unwind().await {
            Ok(Ok(progressed)) => Ok(progressed),
            Ok(Err(cause)) => Err(GameError::Progress { address, cause }),
            Err(panic) => Err(GameError::Panicked {
                address,
                message: panic_message(panic.as_ref()),
            }),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
