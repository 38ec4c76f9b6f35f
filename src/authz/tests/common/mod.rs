//! Shared fixtures: a small tree and configurable authority mocks

#![allow(dead_code)]

use async_trait::async_trait;
use hats_authz::{
    Authority, AuthorityError, EligibilityAuthority, HatId, Hats, HatsConfig, Identity, NewHat,
    StatusAuthority, WearerStatus,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn id(name: &str) -> Identity {
    Identity::new(name)
}

pub fn controller() -> Hats {
    Hats::new(HatsConfig::default())
}

/// Top hat worn by `user:owner` and one child hat
pub struct Tree {
    pub hats: Hats,
    pub owner: Identity,
    pub top: HatId,
    pub hat: HatId,
}

pub async fn tree(params: impl FnOnce(HatId) -> NewHat) -> Tree {
    let hats = controller();
    let owner = id("user:owner");
    let top = hats.create_top_hat(&owner, "Acme DAO", "").await.unwrap();
    let hat = hats.create_hat(&owner, params(top)).await.unwrap();
    Tree { hats, owner, top, hat }
}

// ============================================================================
// ELIGIBILITY AUTHORITIES
// ============================================================================

/// Answers from a table; unknown wearers are eligible and in good standing
#[derive(Default)]
pub struct TableEligibility {
    verdicts: Mutex<HashMap<Identity, WearerStatus>>,
    queries: AtomicUsize,
}

impl TableEligibility {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, wearer: &Identity, eligible: bool, standing: bool) {
        self.verdicts
            .lock()
            .insert(wearer.clone(), WearerStatus::new(eligible, standing));
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EligibilityAuthority for TableEligibility {
    async fn get_wearer_status(
        &self,
        wearer: &Identity,
        _hat: HatId,
    ) -> Result<WearerStatus, AuthorityError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdicts.lock().get(wearer).copied().unwrap_or_default())
    }
}

// ============================================================================
// STATUS AUTHORITIES
// ============================================================================

/// Reports a switchable active flag
pub struct SwitchStatus {
    active: AtomicBool,
    queries: AtomicUsize,
}

impl SwitchStatus {
    pub fn new(active: bool) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicBool::new(active),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusAuthority for SwitchStatus {
    async fn get_hat_status(&self, _hat: HatId) -> Result<bool, AuthorityError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.active.load(Ordering::SeqCst))
    }
}

/// Takes `delay` before answering active
pub struct SlowStatus {
    pub delay: Duration,
}

#[async_trait]
impl StatusAuthority for SlowStatus {
    async fn get_hat_status(&self, _hat: HatId) -> Result<bool, AuthorityError> {
        tokio::time::sleep(self.delay).await;
        Ok(true)
    }
}

// ============================================================================
// FAILING AUTHORITY
// ============================================================================

/// Refuses every query
pub struct FailingAuthority;

#[async_trait]
impl EligibilityAuthority for FailingAuthority {
    async fn get_wearer_status(
        &self,
        _wearer: &Identity,
        _hat: HatId,
    ) -> Result<WearerStatus, AuthorityError> {
        Err(AuthorityError::Rejected("eligibility module reverted".into()))
    }
}

#[async_trait]
impl StatusAuthority for FailingAuthority {
    async fn get_hat_status(&self, _hat: HatId) -> Result<bool, AuthorityError> {
        Err(AuthorityError::Rejected("toggle module reverted".into()))
    }
}

// ============================================================================
// REENTRANT AUTHORITY
// ============================================================================

/// What a reentrant authority does to the controller mid-query
#[derive(Clone)]
pub enum Reentry {
    /// `caller` replaces the hat's status authority
    ChangeToggle { caller: Identity, authority: Authority },
    /// `caller` mints the hat to `wearer`
    Mint { caller: Identity, wearer: Identity },
}

/// Calls back into the controller before answering
pub struct ReentrantAuthority {
    hats: Hats,
    reentry: Reentry,
    answer: bool,
    reentered: AtomicBool,
}

impl ReentrantAuthority {
    pub fn new(hats: Hats, reentry: Reentry, answer: bool) -> Arc<Self> {
        Arc::new(Self {
            hats,
            reentry,
            answer,
            reentered: AtomicBool::new(false),
        })
    }

    pub fn reentered(&self) -> bool {
        self.reentered.load(Ordering::SeqCst)
    }

    async fn reenter(&self, hat: HatId) {
        // Only the first query calls back
        if self.reentered.swap(true, Ordering::SeqCst) {
            return;
        }

        let outcome = match &self.reentry {
            Reentry::ChangeToggle { caller, authority } => {
                self.hats
                    .change_hat_toggle(caller, hat, authority.clone())
                    .await
            }
            Reentry::Mint { caller, wearer } => self.hats.mint(caller, hat, wearer).await,
        };
        outcome.expect("reentrant call should succeed");
    }
}

#[async_trait]
impl StatusAuthority for ReentrantAuthority {
    async fn get_hat_status(&self, hat: HatId) -> Result<bool, AuthorityError> {
        self.reenter(hat).await;
        Ok(self.answer)
    }
}

#[async_trait]
impl EligibilityAuthority for ReentrantAuthority {
    async fn get_wearer_status(
        &self,
        _wearer: &Identity,
        hat: HatId,
    ) -> Result<WearerStatus, AuthorityError> {
        self.reenter(hat).await;
        Ok(WearerStatus::new(self.answer, self.answer))
    }
}
