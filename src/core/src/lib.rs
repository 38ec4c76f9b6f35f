//! # Hats Core
//!
//! Shared types, traits, and error handling for the hats authorization tree.
//! This package holds the pure hat identifier codec and the seams to the
//! collaborators the lifecycle controller consumes (authorities, ledger).

pub mod types;
pub mod traits;
pub mod error;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use types::{HatId, Identity, MAX_LEVELS};
pub use traits::{
    AuthorityError, BalanceLedger, EligibilityAuthority, LedgerError, StatusAuthority,
    WearerStatus,
};
