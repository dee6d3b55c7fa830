//! Concrete collaborators for the game monitor

pub mod game_loader;
pub mod retry;
pub mod rpc;
pub mod status_agent;

#[cfg(test)]
pub(crate) mod mock_rpc;

pub use game_loader::FactoryGameLoader;
pub use retry::{with_retry, RetryConfig};
pub use rpc::{BlockTag, RpcClient, RpcError};
pub use status_agent::{StatusAgent, StatusAgentFactory};
