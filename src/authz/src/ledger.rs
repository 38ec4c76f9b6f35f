//! In-memory balance ledger

use hats_core::{BalanceLedger, HatId, Identity, LedgerError};
use std::collections::HashMap;

/// Unit counts per hat per holder, kept in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedger {
    balances: HashMap<HatId, HashMap<Identity, u64>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BalanceLedger for InMemoryLedger {
    fn credit_unit(&mut self, holder: &Identity, hat: HatId) -> Result<(), LedgerError> {
        let units = self
            .balances
            .entry(hat)
            .or_default()
            .entry(holder.clone())
            .or_insert(0);

        *units = units.checked_add(1).ok_or_else(|| LedgerError::Overflow {
            holder: holder.clone(),
            hat,
        })?;
        Ok(())
    }

    fn debit_unit(&mut self, holder: &Identity, hat: HatId) -> Result<(), LedgerError> {
        let no_units = || LedgerError::NoUnits {
            holder: holder.clone(),
            hat,
        };

        let holders = self.balances.get_mut(&hat).ok_or_else(no_units)?;
        let units = holders.get_mut(holder).ok_or_else(no_units)?;

        *units -= 1;
        if *units == 0 {
            holders.remove(holder);
            if holders.is_empty() {
                self.balances.remove(&hat);
            }
        }
        Ok(())
    }

    fn units_held(&self, holder: &Identity, hat: HatId) -> u64 {
        self.balances
            .get(&hat)
            .and_then(|holders| holders.get(holder))
            .copied()
            .unwrap_or(0)
    }

    fn holders(&self, hat: HatId) -> Vec<Identity> {
        let mut holders: Vec<Identity> = self
            .balances
            .get(&hat)
            .map(|holders| holders.keys().cloned().collect())
            .unwrap_or_default();
        holders.sort();
        holders
    }
}
