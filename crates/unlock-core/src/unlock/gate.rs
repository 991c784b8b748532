//! ============================================================================
//! Unlock Gate - Cached eligibility checking
//! ============================================================================
//! Provides cached eligibility lookups to avoid hitting the oracles on every
//! request. Unlock execution always bypasses the cache.
//! ============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::db::UnlockRecord;

use super::evaluator::UnlockEvaluator;
use super::types::{Eligibility, UnlockError};

/// Default cache duration in seconds (5 minutes)
pub const DEFAULT_CACHE_DURATION_SECS: i64 = 300;

/// Maximum number of entries in the eligibility cache to prevent unbounded growth
const MAX_CACHE_SIZE: usize = 1000;

/// Cached eligibility result
#[derive(Debug, Clone)]
struct CachedEligibility {
    eligibility: Eligibility,
    cached_at: i64,
}

/// Eligibility gate with caching for efficient repeated checks
pub struct UnlockGate {
    evaluator: Arc<UnlockEvaluator>,
    cache: Arc<RwLock<HashMap<String, CachedEligibility>>>,
    cache_duration_secs: i64,
}

impl UnlockGate {
    /// Create a new gate with the default cache duration
    pub fn new(evaluator: Arc<UnlockEvaluator>) -> Self {
        Self::with_cache_duration(evaluator, DEFAULT_CACHE_DURATION_SECS)
    }

    /// Create a new gate with custom cache duration
    pub fn with_cache_duration(evaluator: Arc<UnlockEvaluator>, cache_duration_secs: i64) -> Self {
        Self {
            evaluator,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_duration_secs,
        }
    }

    /// Check eligibility, using the cache when possible.
    /// Only successful check results are cached; errors pass through.
    pub async fn check_eligibility(
        &self,
        user: &str,
        agent_id: &str,
    ) -> Result<Eligibility, UnlockError> {
        let cache_key = format!("{}:{}", user, agent_id);
        let now = chrono::Utc::now().timestamp();

        // Check cache first
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&cache_key) {
                if now - cached.cached_at < self.cache_duration_secs {
                    debug!(
                        "Eligibility cache hit for {} (age: {}s)",
                        cache_key,
                        now - cached.cached_at
                    );
                    return Ok(cached.eligibility.clone());
                }
            }
        }

        // Cache miss or expired - ask the oracles
        debug!("Eligibility cache miss for {}", cache_key);
        let eligibility = self.evaluator.check_eligibility(user, agent_id).await?;

        {
            let mut cache = self.cache.write().await;
            // Evict oldest entry if cache is at capacity
            if cache.len() >= MAX_CACHE_SIZE {
                if let Some(oldest_key) = cache
                    .iter()
                    .min_by_key(|(_, v)| v.cached_at)
                    .map(|(k, _)| k.clone())
                {
                    cache.remove(&oldest_key);
                }
            }
            cache.insert(
                cache_key,
                CachedEligibility {
                    eligibility: eligibility.clone(),
                    cached_at: now,
                },
            );
        }

        Ok(eligibility)
    }

    /// Execute an unlock. Always re-checks against the oracles, never the
    /// cache; invalidates the cached pair on success.
    pub async fn execute_unlock(
        &self,
        user: &str,
        agent_id: &str,
        sub_agent: Option<&str>,
    ) -> Result<UnlockRecord, UnlockError> {
        let record = self
            .evaluator
            .execute_unlock(user, agent_id, sub_agent)
            .await?;
        self.invalidate(user, agent_id).await;
        Ok(record)
    }

    /// Invalidate the cached eligibility for a (user, agent) pair
    pub async fn invalidate(&self, user: &str, agent_id: &str) {
        let cache_key = format!("{}:{}", user, agent_id);
        let mut cache = self.cache.write().await;
        if cache.remove(&cache_key).is_some() {
            info!("Invalidated eligibility cache for {}", cache_key);
        }
    }

    /// Clear the entire cache
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        let count = cache.len();
        cache.clear();
        info!("Cleared {} cached eligibility entries", count);
    }

    /// Get cache statistics: (total entries, unexpired entries)
    pub async fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.read().await;
        let now = chrono::Utc::now().timestamp();
        let total = cache.len();
        let valid = cache
            .values()
            .filter(|c| now - c.cached_at < self.cache_duration_secs)
            .count();
        (total, valid)
    }

    /// The evaluator behind this gate
    pub fn evaluator(&self) -> &UnlockEvaluator {
        &self.evaluator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UnlockDb;
    use crate::oracle::{ChainOracle, StaticSubscriptions};
    use crate::unlock::registry::ContractRegistry;
    use crate::unlock::types::{UnlockContract, UnlockTerms};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Chain oracle that counts ownership lookups
    struct CountingChain {
        owns: bool,
        ownership_calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainOracle for CountingChain {
        async fn owns_token(&self, _wallet: &str, _contract_address: &str) -> Result<bool> {
            self.ownership_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.owns)
        }

        async fn token_balance(&self, _wallet: &str, _token_address: &str) -> Result<u64> {
            Ok(0)
        }

        async fn mint_token(&self, _wallet: &str, _contract_address: &str) -> Result<String> {
            Ok("0xminted".into())
        }
    }

    fn gate_with(chain: Arc<CountingChain>) -> (tempfile::TempDir, UnlockGate) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unlocks.redb");
        let db = UnlockDb::open(Some(path.to_str().unwrap())).unwrap();
        let registry = ContractRegistry::from_entries([(
            "meditation-guide".to_string(),
            UnlockContract {
                terms: UnlockTerms::Nft {
                    contract_address: "0xMeditationNFTContract".into(),
                },
                network: None,
                cost: 0.0,
            },
        )]);
        let evaluator = UnlockEvaluator::new(
            registry,
            chain,
            Arc::new(StaticSubscriptions {
                active: false,
                subscription_reference: None,
            }),
            Arc::new(db),
        );
        (dir, UnlockGate::new(Arc::new(evaluator)))
    }

    #[tokio::test]
    async fn test_second_check_served_from_cache() {
        let chain = Arc::new(CountingChain {
            owns: true,
            ownership_calls: AtomicUsize::new(0),
        });
        let (_dir, gate) = gate_with(chain.clone());

        let first = gate.check_eligibility("u1", "meditation-guide").await.unwrap();
        let second = gate.check_eligibility("u1", "meditation-guide").await.unwrap();

        assert!(first.eligible && second.eligible);
        assert_eq!(chain.ownership_calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.cache_stats().await, (1, 1));
    }

    #[tokio::test]
    async fn test_unlock_bypasses_and_invalidates_cache() {
        let chain = Arc::new(CountingChain {
            owns: true,
            ownership_calls: AtomicUsize::new(0),
        });
        let (_dir, gate) = gate_with(chain.clone());

        gate.check_eligibility("u1", "meditation-guide").await.unwrap();
        assert_eq!(gate.cache_stats().await, (1, 1));

        // Execute goes back to the oracle and drops the cached pair
        gate.execute_unlock("u1", "meditation-guide", None)
            .await
            .unwrap();
        assert_eq!(chain.ownership_calls.load(Ordering::SeqCst), 2);
        assert_eq!(gate.cache_stats().await, (0, 0));
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let chain = Arc::new(CountingChain {
            owns: false,
            ownership_calls: AtomicUsize::new(0),
        });
        let (_dir, gate) = gate_with(chain);

        let err = gate.check_eligibility("u1", "ghost-agent").await;
        assert_eq!(
            err.unwrap_err(),
            UnlockError::ContractNotConfigured("ghost-agent".into())
        );
        assert_eq!(gate.cache_stats().await, (0, 0));
    }

    #[tokio::test]
    async fn test_clear_cache() {
        let chain = Arc::new(CountingChain {
            owns: true,
            ownership_calls: AtomicUsize::new(0),
        });
        let (_dir, gate) = gate_with(chain);

        gate.check_eligibility("u1", "meditation-guide").await.unwrap();
        gate.check_eligibility("u2", "meditation-guide").await.unwrap();
        assert_eq!(gate.cache_stats().await, (2, 2));

        gate.clear_cache().await;
        assert_eq!(gate.cache_stats().await, (0, 0));
    }
}
