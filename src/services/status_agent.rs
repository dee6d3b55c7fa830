//! Status-Watching Game Agent
//!
//! Read-only agent: each step reads the game's on-chain `status()` and
//! reports whether it changed since the previous step. It never submits
//! moves. The solver that attacks or defends claims plugs in behind the same
//! `GameAgent` trait.

use super::rpc::{BlockTag, RpcClient};
use crate::cancel::CancelContext;
use crate::monitor::{AgentFactory, GameAgent};
use crate::types::GameStatus;
use alloy::primitives::Address;
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

sol! {
    function status() external view returns (uint8 status_);
}

pub struct StatusAgent {
    rpc: Arc<RpcClient>,
    game: Address,
    last_status: Option<GameStatus>,
}

impl StatusAgent {
    pub fn new(rpc: Arc<RpcClient>, game: Address) -> Self {
        Self {
            rpc,
            game,
            last_status: None,
        }
    }

    pub fn last_status(&self) -> Option<GameStatus> {
        self.last_status
    }

    /// Record a freshly read status. Returns true if it differs from the last one.
    fn observe(&mut self, status: GameStatus) -> bool {
        if self.last_status == Some(status) {
            return false;
        }

        match self.last_status {
            None => info!(game = %self.game, %status, "Loaded game"),
            Some(previous) => {
                info!(game = %self.game, from = %previous, to = %status, "Game status changed")
            }
        }
        if status.is_resolved() {
            info!(game = %self.game, %status, "Game resolved");
        }

        self.last_status = Some(status);
        true
    }
}

#[async_trait]
impl GameAgent for StatusAgent {
    async fn progress_game(&mut self, ctx: &CancelContext) -> Result<bool> {
        // Resolved games never change again
        if self.last_status.is_some_and(|s| s.is_resolved()) {
            return Ok(false);
        }

        let data = self
            .rpc
            .call(ctx, self.game, &statusCall {}.abi_encode(), BlockTag::Latest)
            .await
            .context("failed to fetch game status")?;
        let status = decode_status(&data)?;
        Ok(self.observe(status))
    }
}

fn decode_status(data: &[u8]) -> Result<GameStatus> {
    let raw = statusCall::abi_decode_returns(data).context("invalid status response")?;
    GameStatus::try_from(raw)
}

/// Builds a `StatusAgent` for every newly discovered game
pub struct StatusAgentFactory {
    rpc: Arc<RpcClient>,
}

impl StatusAgentFactory {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }
}

impl AgentFactory for StatusAgentFactory {
    fn create_agent(&mut self, address: Address) -> Result<Box<dyn GameAgent>> {
        if address == Address::ZERO {
            anyhow::bail!("game proxy address is zero");
        }
        Ok(Box::new(StatusAgent::new(self.rpc.clone(), address)))
    }
}
