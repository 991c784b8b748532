//! ============================================================================
//! Mock Oracles - Simulated chain and subscription backends
//! ============================================================================
//! Randomized stand-ins for dev builds (no real contract integration) and
//! fixed-response variants for tests and deterministic embedding.
//! ============================================================================

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::{ChainOracle, SubscriptionOracle};

/// Simulated chain backend with weighted random outcomes.
/// The default rates mirror the dev-mode behavior of the platform mocks.
#[derive(Debug, Clone)]
pub struct MockChain {
    /// Probability that a wallet owns a token from any contract
    pub ownership_rate: f64,
    /// Probability that a mint transaction is dropped
    pub mint_failure_rate: f64,
    /// Upper bound for the simulated token balance (inclusive)
    pub max_balance: u64,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            ownership_rate: 0.30,
            mint_failure_rate: 0.10,
            max_balance: 10_000,
        }
    }
}

#[async_trait]
impl ChainOracle for MockChain {
    async fn owns_token(&self, _wallet: &str, _contract_address: &str) -> Result<bool> {
        Ok(rand::random::<f64>() < self.ownership_rate)
    }

    async fn token_balance(&self, _wallet: &str, _token_address: &str) -> Result<u64> {
        Ok(rand::random::<u64>() % self.max_balance.saturating_add(1))
    }

    async fn mint_token(&self, _wallet: &str, _contract_address: &str) -> Result<String> {
        if rand::random::<f64>() < self.mint_failure_rate {
            bail!("mint transaction dropped");
        }
        Ok(format!("0x{:032x}", rand::random::<u128>()))
    }
}

/// Simulated subscription backend with weighted random outcomes
#[derive(Debug, Clone)]
pub struct MockSubscriptions {
    /// Probability that a user has an active subscription
    pub active_rate: f64,
    /// Probability that subscription creation fails
    pub subscribe_failure_rate: f64,
}

impl Default for MockSubscriptions {
    fn default() -> Self {
        Self {
            active_rate: 0.70,
            subscribe_failure_rate: 0.05,
        }
    }
}

#[async_trait]
impl SubscriptionOracle for MockSubscriptions {
    async fn is_active(&self, _user: &str, _plan_id: &str) -> Result<bool> {
        Ok(rand::random::<f64>() < self.active_rate)
    }

    async fn subscribe(&self, _user: &str, _plan_id: &str) -> Result<String> {
        if rand::random::<f64>() < self.subscribe_failure_rate {
            bail!("subscription service rejected the request");
        }
        Ok(format!("sub_{}", Uuid::new_v4().simple()))
    }
}

/// Fixed-response chain oracle for tests and deterministic embedding
#[derive(Debug, Clone)]
pub struct StaticChain {
    pub owns: bool,
    pub balance: u64,
    /// `None` makes mint_token fail
    pub mint_reference: Option<String>,
}

impl StaticChain {
    /// A chain where the wallet owns nothing and holds nothing
    pub fn empty() -> Self {
        Self {
            owns: false,
            balance: 0,
            mint_reference: None,
        }
    }
}

#[async_trait]
impl ChainOracle for StaticChain {
    async fn owns_token(&self, _wallet: &str, _contract_address: &str) -> Result<bool> {
        Ok(self.owns)
    }

    async fn token_balance(&self, _wallet: &str, _token_address: &str) -> Result<u64> {
        Ok(self.balance)
    }

    async fn mint_token(&self, _wallet: &str, _contract_address: &str) -> Result<String> {
        match &self.mint_reference {
            Some(reference) => Ok(reference.clone()),
            None => bail!("mint transaction dropped"),
        }
    }
}

/// Fixed-response subscription oracle for tests and deterministic embedding
#[derive(Debug, Clone)]
pub struct StaticSubscriptions {
    pub active: bool,
    /// `None` makes subscribe fail
    pub subscription_reference: Option<String>,
}

#[async_trait]
impl SubscriptionOracle for StaticSubscriptions {
    async fn is_active(&self, _user: &str, _plan_id: &str) -> Result<bool> {
        Ok(self.active)
    }

    async fn subscribe(&self, _user: &str, _plan_id: &str) -> Result<String> {
        match &self.subscription_reference {
            Some(reference) => Ok(reference.clone()),
            None => bail!("subscription service rejected the request"),
        }
    }
}
