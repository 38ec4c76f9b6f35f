//! Directory of authority implementations
//!
//! Hat records name their authorities by identity. The directory maps those
//! identities to the code that answers live queries for them. An identity
//! with no registered implementation cannot answer, and the query fails.

use dashmap::DashMap;
use hats_core::{EligibilityAuthority, Identity, StatusAuthority};
use std::sync::Arc;

/// Identity -> implementation lookup for both authority kinds
#[derive(Default)]
pub struct AuthorityDirectory {
    eligibility: DashMap<Identity, Arc<dyn EligibilityAuthority>>,
    status: DashMap<Identity, Arc<dyn StatusAuthority>>,
}

impl AuthorityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the eligibility implementation for `identity`
    pub fn register_eligibility(
        &self,
        identity: impl Into<Identity>,
        authority: Arc<dyn EligibilityAuthority>,
    ) {
        self.eligibility.insert(identity.into(), authority);
    }

    /// Register (or replace) the status implementation for `identity`
    pub fn register_status(&self, identity: impl Into<Identity>, authority: Arc<dyn StatusAuthority>) {
        self.status.insert(identity.into(), authority);
    }

    pub fn unregister_eligibility(&self, identity: &Identity) -> bool {
        self.eligibility.remove(identity).is_some()
    }

    pub fn unregister_status(&self, identity: &Identity) -> bool {
        self.status.remove(identity).is_some()
    }

    /// Implementation answering eligibility queries for `identity`
    pub fn eligibility(&self, identity: &Identity) -> Option<Arc<dyn EligibilityAuthority>> {
        self.eligibility.get(identity).map(|entry| Arc::clone(entry.value()))
    }

    /// Implementation answering status queries for `identity`
    pub fn status(&self, identity: &Identity) -> Option<Arc<dyn StatusAuthority>> {
        self.status.get(identity).map(|entry| Arc::clone(entry.value()))
    }
}
