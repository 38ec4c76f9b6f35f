//! Wearer lifecycle: mint, transfer, renounce, revoke

use super::{check_wearable, ensure_unchanged, Delegates, Hats, HatsState, Operation};
use crate::admin;
use crate::error::{HatsError, Result};
use crate::events::HatsEvent;
use crate::types::Authority;
use hats_core::{HatId, Identity, WearerStatus};
use tracing::{debug, info};

impl Hats {
    /// Give one unit of `hat` to `wearer`
    ///
    /// The caller must administer the hat. Fails when the supply cap is
    /// reached, when `wearer` already wears the hat, and when the hat is
    /// inactive or the wearer ineligible (asking external authorities live).
    pub async fn mint(&self, caller: &Identity, hat: HatId, wearer: &Identity) -> Result<()> {
        let result = self.mint_inner(caller, hat, wearer).await;
        self.observe(Operation::Mint, result).await
    }

    async fn mint_inner(&self, caller: &Identity, hat: HatId, wearer: &Identity) -> Result<()> {
        let captured = {
            let state = self.state.read().await;
            check_mint(&state, caller, hat, wearer)?
        };

        let verdict = self.live_verdict(hat, &captured, wearer).await?;

        let mut state = self.state.write().await;
        check_mint(&state, caller, hat, wearer)?;
        let record = state.registry.view(hat)?;
        ensure_unchanged(record, &captured)?;
        check_wearable(&state, record, wearer, verdict)?;

        state.ledger.credit_unit(wearer, hat)?;
        let record = state.registry.view_mut(hat)?;
        record.supply += 1;
        let supply = record.supply;

        self.events.record(HatsEvent::HatMinted {
            hat,
            wearer: wearer.clone(),
            operator: caller.clone(),
        });

        info!("{} minted {} to {} (supply={})", caller, hat.path(), wearer, supply);
        Ok(())
    }

    /// Move `from`'s unit of `hat` to `to`
    ///
    /// Admin-only and limited to mutable hats, except that top hats can always
    /// be handed on. Supply is unchanged.
    pub async fn transfer_hat(
        &self,
        caller: &Identity,
        hat: HatId,
        from: &Identity,
        to: &Identity,
    ) -> Result<()> {
        let result = self.transfer_inner(caller, hat, from, to).await;
        self.observe(Operation::Transfer, result).await
    }

    async fn transfer_inner(
        &self,
        caller: &Identity,
        hat: HatId,
        from: &Identity,
        to: &Identity,
    ) -> Result<()> {
        let captured = {
            let state = self.state.read().await;
            check_transfer(&state, caller, hat, from, to)?
        };

        let verdict = self.live_verdict(hat, &captured, to).await?;

        let mut state = self.state.write().await;
        check_transfer(&state, caller, hat, from, to)?;
        let record = state.registry.view(hat)?;
        ensure_unchanged(record, &captured)?;
        check_wearable(&state, record, to, verdict)?;

        // `to` holds nothing and `from` holds a unit, so neither adjustment fails
        state.ledger.credit_unit(to, hat)?;
        state.ledger.debit_unit(from, hat)?;

        self.events.record(HatsEvent::HatTransferred {
            hat,
            from: from.clone(),
            to: to.clone(),
            operator: caller.clone(),
        });

        info!("{} transferred {} from {} to {}", caller, hat.path(), from, to);
        Ok(())
    }

    /// Give up one unit of `hat` held by the caller
    ///
    /// Standing is left untouched.
    pub async fn renounce(&self, caller: &Identity, hat: HatId) -> Result<()> {
        let result = {
            let mut state = self.state.write().await;
            self.renounce_locked(&mut state, caller, hat)
        };
        self.observe(Operation::Renounce, result).await
    }

    fn renounce_locked(&self, state: &mut HatsState, caller: &Identity, hat: HatId) -> Result<()> {
        state.registry.view(hat)?;
        if state.units_held(caller, hat) == 0 {
            return Err(HatsError::NotWearer {
                caller: caller.clone(),
                hat,
            });
        }

        state.burn(caller, hat)?;
        self.events.record(HatsEvent::HatRenounced {
            hat,
            wearer: caller.clone(),
        });

        info!("{} renounced {}", caller, hat.path());
        Ok(())
    }

    /// Apply an eligibility verdict to `wearer` of `hat`
    ///
    /// Callable by the hat's eligibility authority, or by any admin of the hat
    /// when eligibility is self-governed. `standing` is always recorded. When
    /// `eligible` is false a held unit is burned; holding nothing is fine.
    pub async fn set_hat_wearer_status(
        &self,
        caller: &Identity,
        hat: HatId,
        wearer: &Identity,
        eligible: bool,
        standing: bool,
    ) -> Result<()> {
        let result = {
            let mut state = self.state.write().await;
            self.set_wearer_status_locked(&mut state, caller, hat, wearer, eligible, standing)
        };
        self.observe(Operation::SetWearerStatus, result).await
    }

    fn set_wearer_status_locked(
        &self,
        state: &mut HatsState,
        caller: &Identity,
        hat: HatId,
        wearer: &Identity,
        eligible: bool,
        standing: bool,
    ) -> Result<()> {
        let record = state.registry.view(hat)?;
        let permitted = match &record.eligibility_authority {
            Authority::External(authority) => authority == caller,
            Authority::SelfGoverned => admin::caller_is_admin(state.ledger.as_ref(), caller, hat),
        };
        if !permitted {
            return Err(HatsError::NotEligibilityAuthority {
                caller: caller.clone(),
                hat,
            });
        }

        let applied = apply_wearer_status(state, hat, wearer, WearerStatus::new(eligible, standing))?;
        self.events.record(HatsEvent::WearerStatusChanged {
            hat,
            wearer: wearer.clone(),
            eligible,
            standing,
            burned: applied.burned,
        });

        info!(
            "{} set status of {} on {}: eligible={}, standing={}, burned={}",
            caller,
            wearer,
            hat.path(),
            eligible,
            standing,
            applied.burned
        );
        Ok(())
    }

    /// Refresh `wearer`'s status on `hat` from its eligibility authority
    ///
    /// With an external authority the answer is fetched live and applied as
    /// [`Hats::set_hat_wearer_status`] would. A notification is emitted only
    /// when stored state actually changes. With self-governed eligibility the
    /// stored standing is returned.
    pub async fn get_eligibility_status(&self, hat: HatId, wearer: &Identity) -> Result<WearerStatus> {
        let result = self.sync_eligibility(hat, wearer).await;
        self.observe(Operation::SyncEligibility, result).await
    }

    async fn sync_eligibility(&self, hat: HatId, wearer: &Identity) -> Result<WearerStatus> {
        let captured = self.delegates(hat).await?;

        let authority = match &captured.eligibility {
            Authority::External(authority) => authority.clone(),
            Authority::SelfGoverned => {
                let state = self.state.read().await;
                let good = !state.registry.is_in_bad_standing(wearer, hat);
                return Ok(WearerStatus::new(good, good));
            }
        };

        let status = self.query_eligibility(&authority, wearer, hat).await?;

        let mut state = self.state.write().await;
        ensure_unchanged(state.registry.view(hat)?, &captured)?;

        let applied = apply_wearer_status(&mut state, hat, wearer, status)?;
        if applied.changed() {
            self.events.record(HatsEvent::WearerStatusChanged {
                hat,
                wearer: wearer.clone(),
                eligible: status.eligible,
                standing: status.standing,
                burned: applied.burned,
            });
            info!(
                "Eligibility of {} on {} refreshed from {}: {:?}",
                wearer,
                hat.path(),
                authority,
                status
            );
        } else {
            debug!("Eligibility of {} on {} unchanged", wearer, hat.path());
        }

        Ok(status)
    }
}

/// Effects of applying a wearer status
#[derive(Debug, Clone, Copy)]
struct Applied {
    standing_changed: bool,
    burned: bool,
}

impl Applied {
    fn changed(&self) -> bool {
        self.standing_changed || self.burned
    }
}

/// Record standing and burn a held unit on revocation
fn apply_wearer_status(
    state: &mut HatsState,
    hat: HatId,
    wearer: &Identity,
    status: WearerStatus,
) -> Result<Applied> {
    let burned = status.is_revoked() && state.units_held(wearer, hat) > 0;
    if burned {
        state.burn(wearer, hat)?;
    }

    let standing_changed = state.registry.set_standing(wearer, hat, status.standing);
    Ok(Applied {
        standing_changed,
        burned,
    })
}

/// Checks for minting that need no authority; returns the hat's authorities
fn check_mint(state: &HatsState, caller: &Identity, hat: HatId, wearer: &Identity) -> Result<Delegates> {
    let record = state.registry.view(hat)?;
    admin::check_admin(state.ledger.as_ref(), caller, hat)?;

    if state.units_held(wearer, hat) > 0 {
        return Err(HatsError::AlreadyWearingHat {
            wearer: wearer.clone(),
            hat,
        });
    }

    if !record.has_capacity() {
        return Err(HatsError::AllHatsWorn {
            hat,
            max_supply: record.max_supply,
        });
    }

    Ok(Delegates::of(record))
}

fn check_transfer(
    state: &HatsState,
    caller: &Identity,
    hat: HatId,
    from: &Identity,
    to: &Identity,
) -> Result<Delegates> {
    let record = state.registry.view(hat)?;
    admin::check_admin(state.ledger.as_ref(), caller, hat)?;

    // Top hats are immutable yet stay transferable by their wearer
    if !record.mutable && !hat.is_top_level() {
        return Err(HatsError::Immutable(hat));
    }

    if state.units_held(from, hat) == 0 {
        return Err(HatsError::NotWearer {
            caller: from.clone(),
            hat,
        });
    }

    if state.units_held(to, hat) > 0 {
        return Err(HatsError::AlreadyWearingHat {
            wearer: to.clone(),
            hat,
        });
    }

    Ok(Delegates::of(record))
}
