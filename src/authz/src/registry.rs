//! Hat registry
//!
//! An arena of hat records keyed by `HatId`. Records are created once and
//! never removed; descendants reference their ancestors structurally through
//! their own identifier bits.

use crate::error::{HatsError, Result};
use crate::types::{Authority, Hat, NewHat};
use chrono::Utc;
use hats_core::{HatId, Identity};
use std::collections::{HashMap, HashSet};

/// Registry of every hat ever created, plus per-wearer standing
#[derive(Debug, Default)]
pub struct HatRegistry {
    hats: HashMap<HatId, Hat>,

    /// (hat, wearer) pairs in bad standing; absent means good standing
    bad_standings: HashSet<(HatId, Identity)>,

    /// Domain of the most recently created top hat
    last_top_hat_domain: u32,
}

impl HatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` was ever created
    pub fn contains(&self, id: HatId) -> bool {
        self.hats.contains_key(&id)
    }

    /// Record for `id`
    pub fn view(&self, id: HatId) -> Result<&Hat> {
        self.hats.get(&id).ok_or(HatsError::NotFound(id))
    }

    pub(crate) fn view_mut(&mut self, id: HatId) -> Result<&mut Hat> {
        self.hats.get_mut(&id).ok_or(HatsError::NotFound(id))
    }

    /// Number of hats created so far
    pub fn len(&self) -> usize {
        self.hats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hats.is_empty()
    }

    /// Number of top hats created so far
    pub fn top_hat_count(&self) -> u32 {
        self.last_top_hat_domain
    }

    /// Identifier the next top hat will receive
    pub fn next_top_hat_id(&self) -> Result<HatId> {
        let domain = self
            .last_top_hat_domain
            .checked_add(1)
            .ok_or(HatsError::DomainsExhausted)?;
        Ok(HatId::top_hat(domain)?)
    }

    /// Store a new top hat in the next free domain
    ///
    /// Top hats have a supply cap of one, self-governed authorities and are
    /// immutable. The caller is responsible for minting it to its owner.
    pub fn insert_top_hat(&mut self, details: String, image_uri: String) -> Result<HatId> {
        let id = self.next_top_hat_id()?;
        self.last_top_hat_domain = id.domain();

        self.hats.insert(
            id,
            Hat {
                id,
                details,
                image_uri,
                admin: None,
                max_supply: 1,
                supply: 0,
                eligibility_authority: Authority::SelfGoverned,
                status_authority: Authority::SelfGoverned,
                last_child_index: 0,
                active: true,
                mutable: false,
                created_at: Utc::now(),
            },
        );

        Ok(id)
    }

    /// Identifier the next child of `admin` will receive
    pub fn next_child_id(&self, admin: HatId) -> Result<HatId> {
        let record = self.view(admin)?;
        let index = record
            .last_child_index
            .checked_add(1)
            .ok_or(HatsError::AllLevelsUsed { admin })?;

        admin
            .build_child(index)
            .map_err(|e| HatsError::from_codec(admin, e))
    }

    /// Store a new hat under `params.admin`
    ///
    /// Consumes the admin's next child index. Caller authorization is checked
    /// by the controller before this is reached.
    pub fn insert_child(&mut self, params: &NewHat) -> Result<HatId> {
        let id = self.next_child_id(params.admin)?;

        self.view_mut(params.admin)?.last_child_index += 1;
        self.hats.insert(
            id,
            Hat {
                id,
                details: params.details.clone(),
                image_uri: params.image_uri.clone(),
                admin: Some(params.admin),
                max_supply: params.max_supply,
                supply: 0,
                eligibility_authority: params.eligibility_authority.clone(),
                status_authority: params.status_authority.clone(),
                last_child_index: 0,
                active: true,
                mutable: params.mutable,
                created_at: Utc::now(),
            },
        );

        Ok(id)
    }

    /// Whether `wearer` is recorded in bad standing for `hat`
    pub fn is_in_bad_standing(&self, wearer: &Identity, hat: HatId) -> bool {
        self.bad_standings.contains(&(hat, wearer.clone()))
    }

    /// Record the standing of `wearer` on `hat`; returns whether it changed
    pub fn set_standing(&mut self, wearer: &Identity, hat: HatId, standing: bool) -> bool {
        let key = (hat, wearer.clone());
        if standing {
            self.bad_standings.remove(&key)
        } else {
            self.bad_standings.insert(key)
        }
    }

    /// Direct children created under `admin`
    pub fn children(&self, admin: HatId) -> Vec<HatId> {
        let Ok(record) = self.view(admin) else {
            return Vec::new();
        };

        (1..=record.last_child_index)
            .filter_map(|index| admin.build_child(index).ok())
            .filter(|child| self.hats.contains_key(child))
            .collect()
    }
}
