//! ============================================================================
//! Oracle Module - Upstream seams for the unlock evaluator
//! ============================================================================
//! The evaluator consumes these as black boxes:
//! - ChainOracle: token ownership, balances, and minting
//! - SubscriptionOracle: subscription status and creation
//!
//! Production deployments wire real backends here; the bundled mocks simulate
//! the chain for dev builds, and the static variants give tests fixed answers.
//! ============================================================================

mod mock;

pub use mock::{MockChain, MockSubscriptions, StaticChain, StaticSubscriptions};

use anyhow::Result;
use async_trait::async_trait;

/// On-chain reads plus the mint action
#[async_trait]
pub trait ChainOracle: Send + Sync {
    /// Does the wallet hold any token from this contract
    async fn owns_token(&self, wallet: &str, contract_address: &str) -> Result<bool>;

    /// Current balance of the token for the wallet (raw units)
    async fn token_balance(&self, wallet: &str, token_address: &str) -> Result<u64>;

    /// Mint a token from the contract to the wallet, returning the tx reference
    async fn mint_token(&self, wallet: &str, contract_address: &str) -> Result<String>;
}

/// Subscription status lookups plus subscription creation
#[async_trait]
pub trait SubscriptionOracle: Send + Sync {
    /// Is there an active subscription for this plan under this user
    async fn is_active(&self, user: &str, plan_id: &str) -> Result<bool>;

    /// Create a subscription, returning the subscription reference
    async fn subscribe(&self, user: &str, plan_id: &str) -> Result<String>;
}
