//! Active status and the derived wearing predicates

use super::{ensure_unchanged, Delegates, Hats, HatsState, Operation};
use crate::admin;
use crate::error::{HatsError, Result};
use crate::events::HatsEvent;
use crate::types::Authority;
use hats_core::{HatId, Identity};
use tracing::{debug, info};

impl Hats {
    /// Set the stored active flag of `hat`
    ///
    /// Callable by the hat's status authority, or by any admin of the hat when
    /// status is self-governed. Setting the current value again is allowed and
    /// still notifies.
    pub async fn set_hat_status(&self, caller: &Identity, hat: HatId, active: bool) -> Result<()> {
        let result = {
            let mut state = self.state.write().await;
            self.set_status_locked(&mut state, caller, hat, active)
        };
        self.observe(Operation::SetHatStatus, result).await
    }

    fn set_status_locked(
        &self,
        state: &mut HatsState,
        caller: &Identity,
        hat: HatId,
        active: bool,
    ) -> Result<()> {
        let record = state.registry.view(hat)?;
        let permitted = match &record.status_authority {
            Authority::External(authority) => authority == caller,
            Authority::SelfGoverned => admin::caller_is_admin(state.ledger.as_ref(), caller, hat),
        };
        if !permitted {
            return Err(HatsError::NotStatusAuthority {
                caller: caller.clone(),
                hat,
            });
        }

        state.registry.view_mut(hat)?.active = active;
        self.events.record(HatsEvent::HatStatusChanged { hat, active });

        info!("{} set {} active={}", caller, hat.path(), active);
        Ok(())
    }

    /// Refresh the active flag of `hat` from its status authority
    ///
    /// With an external authority the answer is fetched live and stored,
    /// notifying only when the stored flag flips. With self-governed status
    /// the stored flag is returned.
    pub async fn get_active_status(&self, hat: HatId) -> Result<bool> {
        let result = self.sync_status(hat).await;
        self.observe(Operation::SyncStatus, result).await
    }

    async fn sync_status(&self, hat: HatId) -> Result<bool> {
        let (captured, stored) = {
            let state = self.state.read().await;
            let record = state.registry.view(hat)?;
            (Delegates::of(record), record.active)
        };

        let authority = match &captured.status {
            Authority::External(authority) => authority.clone(),
            Authority::SelfGoverned => return Ok(stored),
        };

        let active = self.query_status(&authority, hat).await?;

        let mut state = self.state.write().await;
        let record = state.registry.view_mut(hat)?;
        ensure_unchanged(record, &captured)?;

        if record.active != active {
            record.active = active;
            self.events.record(HatsEvent::HatStatusChanged { hat, active });
            info!("{} active={} per {}", hat.path(), active, authority);
        } else {
            debug!("{} active status unchanged", hat.path());
        }

        Ok(active)
    }

    /// Whether `hat` is currently active
    ///
    /// Asks an external status authority live; never stores the answer.
    pub async fn is_active(&self, hat: HatId) -> Result<bool> {
        let (status, stored) = {
            let state = self.state.read().await;
            let record = state.registry.view(hat)?;
            (record.status_authority.clone(), record.active)
        };

        match status {
            Authority::External(authority) => self.query_status(&authority, hat).await,
            Authority::SelfGoverned => Ok(stored),
        }
    }

    /// Whether `wearer` is in good standing for `hat`
    ///
    /// Asks an external eligibility authority live; otherwise reads the
    /// stored standing. Never stores anything.
    pub async fn is_in_good_standing(&self, wearer: &Identity, hat: HatId) -> Result<bool> {
        match self.local_eligibility(wearer, hat).await? {
            (Authority::External(authority), _) => {
                let status = self.query_eligibility(&authority, wearer, hat).await?;
                Ok(status.standing)
            }
            (Authority::SelfGoverned, good) => Ok(good),
        }
    }

    /// Whether `wearer` is both eligible and in good standing for `hat`
    pub async fn is_eligible(&self, wearer: &Identity, hat: HatId) -> Result<bool> {
        match self.local_eligibility(wearer, hat).await? {
            (Authority::External(authority), _) => {
                let status = self.query_eligibility(&authority, wearer, hat).await?;
                Ok(status.permits_wearing())
            }
            (Authority::SelfGoverned, good) => Ok(good),
        }
    }

    /// Whether `wearer` effectively wears `hat` right now
    ///
    /// Holds a unit, the hat is active, and the wearer is eligible and in
    /// good standing. Authorities are only asked once holding is confirmed.
    pub async fn is_wearer_of_hat(&self, wearer: &Identity, hat: HatId) -> Result<bool> {
        let held = {
            let state = self.state.read().await;
            state.registry.view(hat)?;
            state.units_held(wearer, hat)
        };

        if held == 0 {
            return Ok(false);
        }

        if !self.is_active(hat).await? {
            return Ok(false);
        }

        self.is_eligible(wearer, hat).await
    }

    /// Eligibility authority of `hat` and the stored standing of `wearer`
    async fn local_eligibility(&self, wearer: &Identity, hat: HatId) -> Result<(Authority, bool)> {
        let state = self.state.read().await;
        let record = state.registry.view(hat)?;
        Ok((
            record.eligibility_authority.clone(),
            !state.registry.is_in_bad_standing(wearer, hat),
        ))
    }
}
