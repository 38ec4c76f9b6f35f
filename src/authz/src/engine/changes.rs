//! Admin-side property changes

use super::{Hats, HatsState, Operation};
use crate::admin;
use crate::error::{HatsError, Result};
use crate::events::HatsEvent;
use crate::types::{Authority, Hat};
use hats_core::{HatId, Identity};
use tracing::info;

/// Which immutable hats still accept a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frozen {
    Reject,
    /// Top hats keep editable details and image
    AllowTopHat,
}

impl Hats {
    /// Replace the description of `hat`
    pub async fn change_hat_details(
        &self,
        caller: &Identity,
        hat: HatId,
        details: impl Into<String>,
    ) -> Result<()> {
        let details = details.into();
        self.change(caller, hat, Frozen::AllowTopHat, |record| {
            record.details = details.clone();
            HatsEvent::HatDetailsChanged { hat, details }
        })
        .await
    }

    /// Replace the image reference of `hat`
    pub async fn change_hat_image_uri(
        &self,
        caller: &Identity,
        hat: HatId,
        image_uri: impl Into<String>,
    ) -> Result<()> {
        let image_uri = image_uri.into();
        self.change(caller, hat, Frozen::AllowTopHat, |record| {
            record.image_uri = image_uri.clone();
            HatsEvent::HatImageUriChanged { hat, image_uri }
        })
        .await
    }

    /// Hand eligibility decisions for `hat` to `authority`
    pub async fn change_hat_eligibility(
        &self,
        caller: &Identity,
        hat: HatId,
        authority: Authority,
    ) -> Result<()> {
        self.change(caller, hat, Frozen::Reject, |record| {
            record.eligibility_authority = authority.clone();
            HatsEvent::HatEligibilityChanged { hat, authority }
        })
        .await
    }

    /// Hand active-status decisions for `hat` to `authority`
    pub async fn change_hat_toggle(
        &self,
        caller: &Identity,
        hat: HatId,
        authority: Authority,
    ) -> Result<()> {
        self.change(caller, hat, Frozen::Reject, |record| {
            record.status_authority = authority.clone();
            HatsEvent::HatStatusAuthorityChanged { hat, authority }
        })
        .await
    }

    /// Change the supply cap of `hat`; it may not drop below current supply
    pub async fn change_hat_max_supply(
        &self,
        caller: &Identity,
        hat: HatId,
        max_supply: u32,
    ) -> Result<()> {
        let result = {
            let mut state = self.state.write().await;
            self.change_max_supply_locked(&mut state, caller, hat, max_supply)
        };
        self.observe(Operation::ChangeHat, result).await
    }

    fn change_max_supply_locked(
        &self,
        state: &mut HatsState,
        caller: &Identity,
        hat: HatId,
        max_supply: u32,
    ) -> Result<()> {
        let record = check_changeable(state, caller, hat, Frozen::Reject)?;
        if max_supply < record.supply {
            return Err(HatsError::NewMaxSupplyTooLow {
                hat,
                requested: max_supply,
                supply: record.supply,
            });
        }

        state.registry.view_mut(hat)?.max_supply = max_supply;
        self.events.record(HatsEvent::HatMaxSupplyChanged { hat, max_supply });

        info!("{} set max supply of {} to {}", caller, hat.path(), max_supply);
        Ok(())
    }

    /// Freeze `hat` for good
    pub async fn make_hat_immutable(&self, caller: &Identity, hat: HatId) -> Result<()> {
        self.change(caller, hat, Frozen::Reject, |record| {
            record.mutable = false;
            HatsEvent::HatMadeImmutable { hat }
        })
        .await
    }

    /// Validate an admin change, apply `edit`, record its notification
    async fn change<F>(&self, caller: &Identity, hat: HatId, frozen: Frozen, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Hat) -> HatsEvent,
    {
        let result = {
            let mut state = self.state.write().await;
            self.change_locked(&mut state, caller, hat, frozen, edit)
        };
        self.observe(Operation::ChangeHat, result).await
    }

    fn change_locked<F>(
        &self,
        state: &mut HatsState,
        caller: &Identity,
        hat: HatId,
        frozen: Frozen,
        edit: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut Hat) -> HatsEvent,
    {
        check_changeable(state, caller, hat, frozen)?;

        let event = edit(state.registry.view_mut(hat)?);
        info!("{} changed {}: {}", caller, hat.path(), event.kind());
        self.events.record(event);
        Ok(())
    }
}

/// Caller administers `hat` and the hat still accepts this kind of change
fn check_changeable<'a>(
    state: &'a HatsState,
    caller: &Identity,
    hat: HatId,
    frozen: Frozen,
) -> Result<&'a Hat> {
    let record = state.registry.view(hat)?;
    admin::check_admin(state.ledger.as_ref(), caller, hat)?;

    let exempt = frozen == Frozen::AllowTopHat && record.is_top_level();
    if !record.mutable && !exempt {
        return Err(HatsError::Immutable(hat));
    }

    Ok(record)
}
