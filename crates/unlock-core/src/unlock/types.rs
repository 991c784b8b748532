//! ============================================================================
//! Unlock Types - Contract terms, eligibility results, and error taxonomy
//! ============================================================================
//! Defines how a given agent may be unlocked and the typed results the
//! evaluator returns. These types are serialized to JSON for the registry
//! file and for display in clients.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Sub-agent slot used when an unlock covers the agent as a whole
pub const ROOT_SUB_AGENT: &str = "-";

/// Kind-specific unlock terms for an agent.
/// The `kind` tag in the registry file selects the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnlockTerms {
    /// Wallet must hold a token from this contract; unlocking mints one
    Nft { contract_address: String },
    /// User must have an active subscription under this plan
    Subscription { plan_id: String },
    /// Token balance must be at or above the minimum (raw units)
    TokenUnlock {
        token_address: String,
        required_balance: u64,
    },
    /// Unrecognized kind tag in the registry file.
    /// Surfaces as `UnknownContractKind` at evaluation time instead of
    /// failing the whole registry load.
    #[serde(other)]
    Unknown,
}

impl UnlockTerms {
    /// The method recorded when these terms unlock successfully
    pub fn method(&self) -> Option<UnlockMethod> {
        match self {
            UnlockTerms::Nft { .. } => Some(UnlockMethod::Nft),
            UnlockTerms::Subscription { .. } => Some(UnlockMethod::Subscription),
            UnlockTerms::TokenUnlock { .. } => Some(UnlockMethod::TokenUnlock),
            UnlockTerms::Unknown => None,
        }
    }
}

/// Unlock method stamped onto a successful unlock record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockMethod {
    Nft,
    Subscription,
    TokenUnlock,
}

impl UnlockMethod {
    /// Get human-readable method name
    pub fn display_name(&self) -> &'static str {
        match self {
            UnlockMethod::Nft => "NFT",
            UnlockMethod::Subscription => "Subscription",
            UnlockMethod::TokenUnlock => "Token Unlock",
        }
    }
}

/// Static configuration describing how one agent is unlocked.
/// Loaded from the registry at startup, never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockContract {
    pub terms: UnlockTerms,
    /// Network tag (e.g. "mainnet", "devnet")
    #[serde(default)]
    pub network: Option<String>,
    /// Platform-token price paid on unlock
    #[serde(default)]
    pub cost: f64,
}

/// Outcome of a read-only eligibility check. Not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    /// Human-readable explanation when ineligible
    pub reason: Option<String>,
    pub method: UnlockMethod,
}

/// Error types for the unlock flow.
/// All are recoverable by retry; none is fatal to the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum UnlockError {
    #[error("No unlock contract configured for agent '{0}'")]
    ContractNotConfigured(String),

    #[error("Wallet does not hold a token from {contract_address}")]
    OwnershipNotFound { contract_address: String },

    #[error("No active subscription for plan '{plan_id}'")]
    SubscriptionInactive { plan_id: String },

    #[error("Insufficient balance: need {required}, have {available}")]
    InsufficientBalance { required: u64, available: u64 },

    #[error("Unknown contract kind for agent '{0}'")]
    UnknownContractKind(String),

    #[error("Upstream call failed: {0}")]
    Upstream(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_kind_tag_round_trip() {
        let terms = UnlockTerms::TokenUnlock {
            token_address: "0xSleepToken".into(),
            required_balance: 3000,
        };
        let json = serde_json::to_string(&terms).unwrap();
        assert!(json.contains("\"kind\":\"token_unlock\""));

        let back: UnlockTerms = serde_json::from_str(&json).unwrap();
        assert_eq!(back, terms);
    }

    #[test]
    fn test_unknown_kind_tag_parses() {
        let json = r#"{ "kind": "soulbound_badge", "badge_id": "zen-master" }"#;
        let terms: UnlockTerms = serde_json::from_str(json).unwrap();
        assert_eq!(terms, UnlockTerms::Unknown);
        assert_eq!(terms.method(), None);
    }

    #[test]
    fn test_contract_defaults() {
        let json = r#"{ "terms": { "kind": "nft", "contract_address": "0xMeditationNFTContract" } }"#;
        let contract: UnlockContract = serde_json::from_str(json).unwrap();
        assert_eq!(contract.network, None);
        assert_eq!(contract.cost, 0.0);
        assert_eq!(contract.terms.method(), Some(UnlockMethod::Nft));
    }

    #[test]
    fn test_error_messages() {
        let err = UnlockError::InsufficientBalance {
            required: 3000,
            available: 2999,
        };
        assert_eq!(err.to_string(), "Insufficient balance: need 3000, have 2999");

        let err = UnlockError::ContractNotConfigured("sleep-ai".into());
        assert!(err.to_string().contains("sleep-ai"));
    }

    #[test]
    fn test_method_display_names() {
        assert_eq!(UnlockMethod::Nft.display_name(), "NFT");
        assert_eq!(UnlockMethod::Subscription.display_name(), "Subscription");
        assert_eq!(UnlockMethod::TokenUnlock.display_name(), "Token Unlock");
    }
}
