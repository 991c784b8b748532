//! ============================================================================
//! Unlock Evaluator - Eligibility checks and unlock execution
//! ============================================================================
//! Branches on the agent's contract terms, asks the matching oracle, and on a
//! clean success writes exactly one ledger record. Failure paths never write.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{UnlockDb, UnlockRecord};
use crate::oracle::{ChainOracle, SubscriptionOracle};

use super::registry::ContractRegistry;
use super::types::{Eligibility, UnlockError, UnlockMethod, UnlockTerms, ROOT_SUB_AGENT};

/// Evaluates unlock eligibility and executes unlocks for configured agents
pub struct UnlockEvaluator {
    registry: ContractRegistry,
    chain: Arc<dyn ChainOracle>,
    subscriptions: Arc<dyn SubscriptionOracle>,
    db: Arc<UnlockDb>,
}

impl UnlockEvaluator {
    pub fn new(
        registry: ContractRegistry,
        chain: Arc<dyn ChainOracle>,
        subscriptions: Arc<dyn SubscriptionOracle>,
        db: Arc<UnlockDb>,
    ) -> Self {
        Self {
            registry,
            chain,
            subscriptions,
            db,
        }
    }

    /// Read-only eligibility check. Never writes to the ledger.
    /// Ineligible is a normal `Ok` outcome with a reason; errors are reserved
    /// for missing/unknown contracts and oracle failures.
    pub async fn check_eligibility(
        &self,
        user: &str,
        agent_id: &str,
    ) -> Result<Eligibility, UnlockError> {
        let contract = self
            .registry
            .get(agent_id)
            .ok_or_else(|| UnlockError::ContractNotConfigured(agent_id.to_string()))?;

        match &contract.terms {
            UnlockTerms::Nft { contract_address } => {
                let owns = self
                    .chain
                    .owns_token(user, contract_address)
                    .await
                    .map_err(upstream)?;
                debug!(
                    "Ownership check for {} on {}: {}",
                    user, contract_address, owns
                );
                Ok(Eligibility {
                    eligible: owns,
                    reason: (!owns)
                        .then(|| format!("Wallet does not hold a token from {}", contract_address)),
                    method: UnlockMethod::Nft,
                })
            }

            UnlockTerms::Subscription { plan_id } => {
                let active = self
                    .subscriptions
                    .is_active(user, plan_id)
                    .await
                    .map_err(upstream)?;
                debug!(
                    "Subscription check for {} on plan {}: {}",
                    user, plan_id, active
                );
                Ok(Eligibility {
                    eligible: active,
                    reason: (!active)
                        .then(|| format!("No active subscription for plan '{}'", plan_id)),
                    method: UnlockMethod::Subscription,
                })
            }

            UnlockTerms::TokenUnlock {
                token_address,
                required_balance,
            } => {
                let available = self
                    .chain
                    .token_balance(user, token_address)
                    .await
                    .map_err(upstream)?;
                let eligible = available >= *required_balance;
                debug!(
                    "Balance check for {} on {}: {} (need {})",
                    user, token_address, available, required_balance
                );
                Ok(Eligibility {
                    eligible,
                    reason: (!eligible).then(|| {
                        format!(
                            "Balance {} below required {}",
                            available, required_balance
                        )
                    }),
                    method: UnlockMethod::TokenUnlock,
                })
            }

            UnlockTerms::Unknown => Err(UnlockError::UnknownContractKind(agent_id.to_string())),
        }
    }

    /// Execute an unlock for the (user, agent, sub-agent) triple.
    ///
    /// The gating condition is re-checked at execution time (no reservation
    /// between check and execute). On success exactly one ledger record is
    /// upserted for the triple; every failure path leaves the ledger
    /// untouched. Re-unlocking the same triple overwrites the prior record.
    pub async fn execute_unlock(
        &self,
        user: &str,
        agent_id: &str,
        sub_agent: Option<&str>,
    ) -> Result<UnlockRecord, UnlockError> {
        let contract = self
            .registry
            .get(agent_id)
            .ok_or_else(|| UnlockError::ContractNotConfigured(agent_id.to_string()))?;

        let (method, proof) = match &contract.terms {
            UnlockTerms::Nft { contract_address } => {
                let owns = self
                    .chain
                    .owns_token(user, contract_address)
                    .await
                    .map_err(upstream)?;
                if !owns {
                    warn!(
                        "Unlock denied for {} on {}: no token from {}",
                        user, agent_id, contract_address
                    );
                    return Err(UnlockError::OwnershipNotFound {
                        contract_address: contract_address.clone(),
                    });
                }
                let tx = self
                    .chain
                    .mint_token(user, contract_address)
                    .await
                    .map_err(upstream)?;
                (UnlockMethod::Nft, tx)
            }

            UnlockTerms::Subscription { plan_id } => {
                let active = self
                    .subscriptions
                    .is_active(user, plan_id)
                    .await
                    .map_err(upstream)?;
                if !active {
                    warn!(
                        "Unlock denied for {} on {}: plan '{}' inactive",
                        user, agent_id, plan_id
                    );
                    return Err(UnlockError::SubscriptionInactive {
                        plan_id: plan_id.clone(),
                    });
                }
                let reference = self
                    .subscriptions
                    .subscribe(user, plan_id)
                    .await
                    .map_err(upstream)?;
                (UnlockMethod::Subscription, reference)
            }

            UnlockTerms::TokenUnlock {
                token_address,
                required_balance,
            } => {
                let available = self
                    .chain
                    .token_balance(user, token_address)
                    .await
                    .map_err(upstream)?;
                if available < *required_balance {
                    warn!(
                        "Unlock denied for {} on {}: balance {} below {}",
                        user, agent_id, available, required_balance
                    );
                    return Err(UnlockError::InsufficientBalance {
                        required: *required_balance,
                        available,
                    });
                }
                // No escrow step; the threshold check above is the unlock
                (UnlockMethod::TokenUnlock, format!("unlock-{}", Uuid::new_v4()))
            }

            UnlockTerms::Unknown => {
                return Err(UnlockError::UnknownContractKind(agent_id.to_string()))
            }
        };

        let record = UnlockRecord {
            user: user.to_string(),
            agent_id: agent_id.to_string(),
            sub_agent: sub_agent.unwrap_or(ROOT_SUB_AGENT).to_string(),
            method,
            proof,
            cost: contract.cost,
            unlocked_at: chrono::Utc::now().timestamp(),
        };

        self.db
            .store_unlock(&record)
            .map_err(|e| UnlockError::Storage(e.to_string()))?;

        info!(
            "Unlocked agent {} for {} via {}",
            agent_id,
            user,
            method.display_name()
        );

        Ok(record)
    }

    /// Has the triple already been unlocked
    pub fn is_unlocked(
        &self,
        user: &str,
        agent_id: &str,
        sub_agent: Option<&str>,
    ) -> Result<bool, UnlockError> {
        Ok(self.unlock_record(user, agent_id, sub_agent)?.is_some())
    }

    /// Fetch the ledger record for a triple, if any
    pub fn unlock_record(
        &self,
        user: &str,
        agent_id: &str,
        sub_agent: Option<&str>,
    ) -> Result<Option<UnlockRecord>, UnlockError> {
        self.db
            .get_unlock(user, agent_id, sub_agent.unwrap_or(ROOT_SUB_AGENT))
            .map_err(|e| UnlockError::Storage(e.to_string()))
    }

    /// The contract table this evaluator runs against
    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }
}

fn upstream(e: anyhow::Error) -> UnlockError {
    UnlockError::Upstream(e.to_string())
}
