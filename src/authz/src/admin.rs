//! Admin checks over the hat tree
//!
//! Admin rights come from wearing any hat on the target's ancestry path
//! (or the target itself when it is a top hat). Ancestry is read off the
//! identifier bits; the ledger is consulted for what the caller wears. Nothing
//! here is cached because wearer sets change between calls.

use crate::error::{HatsError, Result};
use hats_core::{BalanceLedger, HatId, Identity};

/// Whether wearers of `candidate` administer `hat`
pub fn is_admin_of(candidate: HatId, hat: HatId) -> bool {
    candidate.is_admin_of(&hat)
}

/// Nearest admin hat of `hat` that `caller` holds a unit of
pub fn admin_hat_worn_by(ledger: &dyn BalanceLedger, caller: &Identity, hat: HatId) -> Option<HatId> {
    hat.admins()
        .find(|admin| ledger.units_held(caller, *admin) > 0)
}

/// Whether `caller` currently administers `hat`
pub fn caller_is_admin(ledger: &dyn BalanceLedger, caller: &Identity, hat: HatId) -> bool {
    admin_hat_worn_by(ledger, caller, hat).is_some()
}

/// Fail with `NotAdmin` unless `caller` administers `hat`
pub fn check_admin(ledger: &dyn BalanceLedger, caller: &Identity, hat: HatId) -> Result<HatId> {
    admin_hat_worn_by(ledger, caller, hat).ok_or_else(|| HatsError::NotAdmin {
        caller: caller.clone(),
        hat,
    })
}

/// Fail with `NotAdmin` unless `caller` may create hats under `admin`
///
/// Creating a child requires administering the child, which means wearing
/// `admin` itself or any of its ancestors.
pub fn check_creator(ledger: &dyn BalanceLedger, caller: &Identity, admin: HatId) -> Result<HatId> {
    std::iter::once(admin)
        .chain(admin.ancestors().collect::<Vec<_>>().into_iter().rev())
        .find(|hat| ledger.units_held(caller, *hat) > 0)
        .ok_or_else(|| HatsError::NotAdmin {
            caller: caller.clone(),
            hat: admin,
        })
}
