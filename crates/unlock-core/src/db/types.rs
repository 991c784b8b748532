//! ============================================================================
//! Database Types - Serializable records for redb storage
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::unlock::UnlockMethod;

/// Evidence that a user has unlocked a specific (agent, sub-agent) pair.
/// At most one record exists per (user, agent, sub_agent) triple; re-unlocking
/// overwrites the previous record (last-write-wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockRecord {
    pub user: String,
    pub agent_id: String,
    /// `-` when the unlock covers the whole agent
    pub sub_agent: String,
    pub method: UnlockMethod,
    /// Transaction hash or subscription id backing the unlock
    pub proof: String,
    /// Platform-token price paid
    pub cost: f64,
    pub unlocked_at: i64,
}

impl UnlockRecord {
    /// Ledger key for this record's triple
    pub fn key(&self) -> String {
        super::unlock_key(&self.user, &self.agent_id, &self.sub_agent)
    }
}

/// Aggregate counts over the unlock ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub total_unlocks: usize,
    pub method_counts: HashMap<String, usize>,
    pub distinct_users: usize,
}
