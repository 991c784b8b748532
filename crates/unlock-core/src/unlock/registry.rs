//! ============================================================================
//! Contract Registry - Agent unlock contract table
//! ============================================================================
//! Maps agent ids to their unlock contracts. Loaded once from a JSON file at
//! startup and read-only afterwards.
//! ============================================================================

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::types::UnlockContract;

/// Immutable table of unlock contracts keyed by agent id
pub struct ContractRegistry {
    contracts: HashMap<String, UnlockContract>,
}

impl ContractRegistry {
    /// Load the registry from a JSON file: `{ "<agent-id>": { "terms": {...}, ... } }`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read contract registry {}: {}", path.display(), e))?;
        let contracts: HashMap<String, UnlockContract> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("Failed to parse contract registry {}: {}", path.display(), e))?;

        info!(
            "Loaded {} unlock contracts from {}",
            contracts.len(),
            path.display()
        );

        Ok(Self { contracts })
    }

    /// Build a registry from in-memory entries (embedding and tests)
    pub fn from_entries(entries: impl IntoIterator<Item = (String, UnlockContract)>) -> Self {
        Self {
            contracts: entries.into_iter().collect(),
        }
    }

    /// Look up the contract for an agent
    pub fn get(&self, agent_id: &str) -> Option<&UnlockContract> {
        self.contracts.get(agent_id)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Iterate over configured agent ids
    pub fn agent_ids(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unlock::types::{UnlockMethod, UnlockTerms};
    use std::io::Write;

    fn nft_contract(address: &str) -> UnlockContract {
        UnlockContract {
            terms: UnlockTerms::Nft {
                contract_address: address.into(),
            },
            network: Some("mainnet".into()),
            cost: 5.0,
        }
    }

    #[test]
    fn test_from_entries_lookup() {
        let registry = ContractRegistry::from_entries([(
            "meditation-guide".to_string(),
            nft_contract("0xMeditationNFTContract"),
        )]);

        assert_eq!(registry.len(), 1);
        let contract = registry.get("meditation-guide").unwrap();
        assert_eq!(contract.terms.method(), Some(UnlockMethod::Nft));
        assert!(registry.get("sleep-ai").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "sleep-ai": {{
                    "terms": {{ "kind": "token_unlock", "token_address": "0xSleepToken", "required_balance": 3000 }},
                    "cost": 10.0
                }},
                "legacy-agent": {{
                    "terms": {{ "kind": "genesis_pass" }}
                }}
            }}"#
        )
        .unwrap();

        let registry = ContractRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("sleep-ai").unwrap().terms,
            UnlockTerms::TokenUnlock {
                token_address: "0xSleepToken".into(),
                required_balance: 3000
            }
        );
        // Unrecognized kinds load as Unknown rather than failing the file
        assert_eq!(registry.get("legacy-agent").unwrap().terms, UnlockTerms::Unknown);
    }

    #[test]
    fn test_load_missing_file() {
        let result = ContractRegistry::load("/nonexistent/contracts.json");
        assert!(result.is_err());
    }
}
