//! ============================================================================
//! UNLOCK-CORE: Agent unlock rule engine
//! ============================================================================
//! This crate handles the backend logic for agent unlocks:
//! - Contract registry (how each agent may be unlocked)
//! - Oracle seams for ownership / subscription / balance lookups
//! - Unlock evaluator with a typed error taxonomy
//! - Local unlock ledger backed by redb
//! ============================================================================

pub mod db;
pub mod oracle;
pub mod unlock;

// Re-export main types for convenience
pub use db::{DbStats, UnlockDb, UnlockRecord};
pub use unlock::{
    ContractRegistry, Eligibility, UnlockContract, UnlockError, UnlockEvaluator, UnlockGate,
    UnlockMethod, UnlockTerms,
};
