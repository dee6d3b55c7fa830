//! Dispute Game Factory Loader
//!
//! Lists every game the factory has created as of a given block by reading
//! `gameCount()` and then `gameAtIndex(i)` for each index. Both calls are
//! pinned to the same block so the listing is a consistent snapshot.

use super::rpc::{BlockTag, RpcClient};
use crate::cancel::CancelContext;
use crate::monitor::GameSource;
use crate::types::{BlockNumber, GameRecord};
use alloy::primitives::{Address, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

sol! {
    function gameCount() external view returns (uint256 gameCount_);

    function gameAtIndex(uint256 _index)
        external
        view
        returns (uint8 gameType_, uint64 timestamp_, address proxy_);
}

/// Loads games from the dispute game factory contract
pub struct FactoryGameLoader {
    rpc: Arc<RpcClient>,
    factory: Address,
}

impl FactoryGameLoader {
    pub fn new(rpc: Arc<RpcClient>, factory: Address) -> Self {
        Self { rpc, factory }
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    /// Fetch all games in factory index order
    pub async fn fetch_games(
        &self,
        ctx: &CancelContext,
        block: BlockNumber,
    ) -> Result<Vec<GameRecord>> {
        let tag = BlockTag::Number(block);

        let data = self
            .rpc
            .call(ctx, self.factory, &gameCountCall {}.abi_encode(), tag)
            .await
            .context("failed to fetch game count")?;
        let count = decode_game_count(&data)?;
        debug!(block, count, factory = %self.factory, "Loading games");

        // The count is untrusted node output; grow as records actually arrive
        let mut games = Vec::new();
        for index in 0..count {
            let call = gameAtIndexCall {
                _index: U256::from(index),
            };
            let data = self
                .rpc
                .call(ctx, self.factory, &call.abi_encode(), tag)
                .await
                .with_context(|| format!("failed to fetch game at index {}", index))?;
            let game = decode_game_at_index(&data)
                .with_context(|| format!("invalid game at index {}", index))?;
            games.push(game);
        }

        Ok(games)
    }
}

#[async_trait]
impl GameSource for FactoryGameLoader {
    async fn fetch_all_games_at_block(
        &self,
        ctx: &CancelContext,
        block: BlockNumber,
    ) -> Result<Vec<GameRecord>> {
        self.fetch_games(ctx, block).await
    }
}

fn decode_game_count(data: &[u8]) -> Result<u64> {
    let count = gameCountCall::abi_decode_returns(data).context("invalid gameCount response")?;
    if count > U256::from(u64::MAX) {
        anyhow::bail!("game count {} does not fit in u64", count);
    }
    Ok(count.to::<u64>())
}

fn decode_game_at_index(data: &[u8]) -> Result<GameRecord> {
    let game = gameAtIndexCall::abi_decode_returns(data).context("invalid gameAtIndex response")?;
    Ok(GameRecord {
        game_type: game.gameType_,
        timestamp: game.timestamp_,
        address: game.proxy_,
    })
}
