//! ============================================================================
//! Unlock Module - Eligibility rules and unlock execution
//! ============================================================================
//! Decides whether a user may unlock an agent and records successful unlocks.
//!
//! ## Unlock methods
//! - **Nft**: wallet holds a token from the configured contract; unlocking
//!   mints a new token and records the transaction reference
//! - **Subscription**: active subscription under the configured plan;
//!   unlocking creates a subscription record
//! - **TokenUnlock**: token balance at or above the configured minimum,
//!   re-checked at execution time (no escrow)
//!
//! ## Usage
//! ```rust,ignore
//! use unlock_core::unlock::{ContractRegistry, UnlockEvaluator};
//!
//! let evaluator = UnlockEvaluator::new(registry, chain, subscriptions, db);
//! let record = evaluator.execute_unlock("u1", "meditation-guide", None).await?;
//! ```
//! ============================================================================

mod evaluator;
mod gate;
mod registry;
mod types;

// Re-export public types
pub use evaluator::UnlockEvaluator;
pub use gate::{UnlockGate, DEFAULT_CACHE_DURATION_SECS};
pub use registry::ContractRegistry;
pub use types::{
    Eligibility, UnlockContract, UnlockError, UnlockMethod, UnlockTerms, ROOT_SUB_AGENT,
};
