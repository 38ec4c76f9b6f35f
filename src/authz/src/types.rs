//! Hat records and creation parameters

use chrono::{DateTime, Utc};
use hats_core::{HatId, Identity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who decides a hat's eligibility or active status
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "identity", rename_all = "snake_case")]
pub enum Authority {
    /// The locally stored flag governs; admins of the hat may change it
    SelfGoverned,

    /// A third party answers live queries and may set the flag directly
    External(Identity),
}

impl Authority {
    /// Delegate to an external identity
    pub fn external(identity: impl Into<Identity>) -> Self {
        Authority::External(identity.into())
    }

    /// The delegated identity, if any
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Authority::SelfGoverned => None,
            Authority::External(identity) => Some(identity),
        }
    }

    pub fn is_self_governed(&self) -> bool {
        matches!(self, Authority::SelfGoverned)
    }
}

impl Default for Authority {
    fn default() -> Self {
        Authority::SelfGoverned
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authority::SelfGoverned => write!(f, "self"),
            Authority::External(identity) => write!(f, "{}", identity),
        }
    }
}

/// Stored role record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hat {
    /// Hierarchical identifier (also the registry key)
    pub id: HatId,

    /// Free-form description
    pub details: String,

    /// Image reference
    #[serde(default)]
    pub image_uri: String,

    /// Immediate admin; `None` for top hats
    pub admin: Option<HatId>,

    /// Maximum number of concurrent wearers
    pub max_supply: u32,

    /// Current number of wearers
    pub supply: u32,

    /// Wearer eligibility and standing
    pub eligibility_authority: Authority,

    /// Active status
    pub status_authority: Authority,

    /// Last child index handed out under this hat
    pub last_child_index: u8,

    /// Local active flag; a cache when the status authority is external
    pub active: bool,

    /// Whether admins may still change the hat's properties
    pub mutable: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Hat {
    pub fn is_top_level(&self) -> bool {
        self.id.is_top_level()
    }

    pub fn level(&self) -> usize {
        self.id.level()
    }

    /// Whether another unit can be minted
    pub fn has_capacity(&self) -> bool {
        self.supply < self.max_supply
    }
}

fn default_mutable() -> bool {
    true
}

/// Parameters for creating a hat under an existing admin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHat {
    /// Admin the new hat is placed under
    pub admin: HatId,

    /// Free-form description
    pub details: String,

    /// Maximum number of concurrent wearers
    pub max_supply: u32,

    #[serde(default)]
    pub eligibility_authority: Authority,

    #[serde(default)]
    pub status_authority: Authority,

    #[serde(default = "default_mutable")]
    pub mutable: bool,

    #[serde(default)]
    pub image_uri: String,
}

impl NewHat {
    /// Mutable, self-governed hat
    pub fn new(admin: HatId, details: impl Into<String>, max_supply: u32) -> Self {
        Self {
            admin,
            details: details.into(),
            max_supply,
            eligibility_authority: Authority::SelfGoverned,
            status_authority: Authority::SelfGoverned,
            mutable: true,
            image_uri: String::new(),
        }
    }

    /// Delegate eligibility decisions
    pub fn with_eligibility(mut self, authority: Authority) -> Self {
        self.eligibility_authority = authority;
        self
    }

    /// Delegate active-status decisions
    pub fn with_status(mut self, authority: Authority) -> Self {
        self.status_authority = authority;
        self
    }

    pub fn with_image_uri(mut self, image_uri: impl Into<String>) -> Self {
        self.image_uri = image_uri.into();
        self
    }

    /// Create the hat already frozen
    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }
}
