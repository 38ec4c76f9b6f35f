//! Balance ledger contract

use crate::types::{HatId, Identity};
use thiserror::Error;

/// Ledger bookkeeping failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Debit of a unit the holder does not have
    #[error("{holder} holds no units of {hat}")]
    NoUnits { holder: Identity, hat: HatId },

    /// Credit would overflow the holder's unit count
    #[error("unit count overflow for {holder} on {hat}")]
    Overflow { holder: Identity, hat: HatId },
}

/// Per-identity unit counts per hat
///
/// Credits and debits are exact single-unit adjustments and a holder's count
/// never goes below zero. The controller calls these while holding its state
/// lock, so implementations are synchronous.
pub trait BalanceLedger: Send + Sync {
    /// Add one unit of `hat` to `holder`
    fn credit_unit(&mut self, holder: &Identity, hat: HatId) -> Result<(), LedgerError>;

    /// Remove one unit of `hat` from `holder`
    fn debit_unit(&mut self, holder: &Identity, hat: HatId) -> Result<(), LedgerError>;

    /// Units of `hat` held by `holder`
    fn units_held(&self, holder: &Identity, hat: HatId) -> u64;

    /// Identities currently holding at least one unit of `hat`
    fn holders(&self, hat: HatId) -> Vec<Identity>;
}
