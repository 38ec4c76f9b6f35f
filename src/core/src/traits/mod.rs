//! Contracts for the collaborators the lifecycle controller consumes

pub mod authority;
pub mod ledger;

// Re-export commonly used traits
pub use authority::{AuthorityError, EligibilityAuthority, StatusAuthority, WearerStatus};
pub use ledger::{BalanceLedger, LedgerError};
