//! Hierarchical hat identifiers
//!
//! A `HatId` packs the full admin chain of a hat into 256 bits:
//!
//! ```text
//! ┌──────────────┬─────────┬─────────┬─────┬──────────┐
//! │ Top domain   │ Level 1 │ Level 2 │ ... │ Level 28 │
//! │ 32 bits      │ 8 bits  │ 8 bits  │     │ 8 bits   │
//! └──────────────┴─────────┴─────────┴─────┴──────────┘
//! ```
//!
//! The domain identifies a tree. Each level segment holds the child index
//! (1..=255) chosen under the admin one level up; zero means "nothing at this
//! depth or below". Ancestry questions are answered by masking, never by
//! walking stored parent pointers.

use crate::error::{CoreError, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Width of a hat identifier in bytes
pub const HAT_ID_BYTES: usize = 32;

/// Width of the top (domain) segment in bits
pub const TOP_HAT_BITS: usize = 32;

/// Width of each level segment in bits
pub const LEVEL_BITS: usize = 8;

/// Number of levels below the top hat
pub const MAX_LEVELS: usize = 28;

/// Largest child index a single admin can hand out
pub const MAX_CHILD_INDEX: u8 = u8::MAX;

const DOMAIN_BYTES: usize = TOP_HAT_BITS / 8;

// Every segment is byte aligned and the layout fills the identifier exactly.
const _: () = assert!(LEVEL_BITS == 8);
const _: () = assert!(TOP_HAT_BITS % 8 == 0);
const _: () = assert!(DOMAIN_BYTES + MAX_LEVELS * LEVEL_BITS / 8 == HAT_ID_BYTES);

/// 256-bit hierarchical hat identifier (big-endian)
///
/// Values are only constructed through [`HatId::top_hat`],
/// [`HatId::build_child`], [`HatId::from_bytes`] or parsing, all of which
/// reject a zero domain and non-contiguous segments.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HatId([u8; HAT_ID_BYTES]);

impl HatId {
    /// Identifier of the top hat for `domain`
    pub fn top_hat(domain: u32) -> Result<Self> {
        if domain == 0 {
            return Err(CoreError::InvalidDomain(domain));
        }

        let mut bytes = [0u8; HAT_ID_BYTES];
        bytes[..DOMAIN_BYTES].copy_from_slice(&domain.to_be_bytes());
        Ok(Self(bytes))
    }

    /// Validate raw big-endian bytes as a hat identifier
    pub fn from_bytes(bytes: [u8; HAT_ID_BYTES]) -> Result<Self> {
        let id = Self(bytes);
        if id.domain() == 0 {
            return Err(CoreError::InvalidDomain(0));
        }

        let segments = id.segments();
        let level = segments.iter().take_while(|segment| **segment != 0).count();
        if let Some(offset) = segments[level..].iter().position(|segment| *segment != 0) {
            return Err(CoreError::NonContiguous {
                segment: level + offset + 1,
            });
        }

        Ok(id)
    }

    /// Raw big-endian bytes
    pub fn as_bytes(&self) -> &[u8; HAT_ID_BYTES] {
        &self.0
    }

    /// Tree domain: the top segment shifted into its own integer space
    pub fn domain(&self) -> u32 {
        let mut domain = [0u8; DOMAIN_BYTES];
        domain.copy_from_slice(&self.0[..DOMAIN_BYTES]);
        u32::from_be_bytes(domain)
    }

    fn segments(&self) -> &[u8] {
        &self.0[DOMAIN_BYTES..]
    }

    /// Child index stored at `depth` (1..=MAX_LEVELS)
    pub fn segment(&self, depth: usize) -> Option<u8> {
        if depth == 0 || depth > MAX_LEVELS {
            return None;
        }
        Some(self.0[DOMAIN_BYTES + depth - 1])
    }

    /// Depth below the top hat (0 for a top hat)
    pub fn level(&self) -> usize {
        self.segments()
            .iter()
            .take_while(|segment| **segment != 0)
            .count()
    }

    /// True when every level segment is empty
    pub fn is_top_level(&self) -> bool {
        self.domain() != 0 && self.segments().iter().all(|segment| *segment == 0)
    }

    /// Identifier with every segment deeper than `level` cleared
    ///
    /// `admin_at_level(0)` is the top hat of the tree; levels at or beyond
    /// the hat's own depth return the hat itself.
    pub fn admin_at_level(&self, level: usize) -> HatId {
        let keep = DOMAIN_BYTES + level.min(MAX_LEVELS);
        let mut bytes = self.0;
        bytes[keep..].fill(0);
        HatId(bytes)
    }

    /// Immediate admin (parent) of this hat, `None` for top hats
    pub fn admin(&self) -> Option<HatId> {
        match self.level() {
            0 => None,
            level => Some(self.admin_at_level(level - 1)),
        }
    }

    /// Child index this hat occupies under its admin
    pub fn local_index(&self) -> Option<u8> {
        self.segment(self.level())
    }

    /// Identifier of child `index` directly below this hat
    pub fn build_child(&self, index: u8) -> Result<HatId> {
        if index == 0 {
            return Err(CoreError::InvalidChildIndex(index));
        }

        let level = self.level();
        if level >= MAX_LEVELS {
            return Err(CoreError::DepthExceeded { level });
        }

        let mut bytes = self.0;
        bytes[DOMAIN_BYTES + level] = index;
        Ok(HatId(bytes))
    }

    /// Structural ancestry: `self` lies on `other`'s path at its own depth
    pub fn is_ancestor_or_self(&self, other: &HatId) -> bool {
        *self == other.admin_at_level(self.level())
    }

    /// Whether wearers of `self` administer `hat`
    ///
    /// Strict ancestors administer their descendants at any depth. A top hat
    /// is the only hat that administers itself.
    pub fn is_admin_of(&self, hat: &HatId) -> bool {
        if hat.is_top_level() {
            return self == hat;
        }
        self.level() < hat.level() && self.is_ancestor_or_self(hat)
    }

    /// Hats whose wearers administer this hat, nearest first
    pub fn admins(&self) -> impl Iterator<Item = HatId> {
        let id = *self;
        let top = id.is_top_level().then_some(id);
        top.into_iter()
            .chain((0..id.level()).rev().map(move |level| id.admin_at_level(level)))
    }

    /// Strict ancestors, top hat first
    pub fn ancestors(&self) -> impl Iterator<Item = HatId> {
        let id = *self;
        (0..id.level()).map(move |level| id.admin_at_level(level))
    }

    /// Whether both hats belong to the same tree
    pub fn same_tree(&self, other: &HatId) -> bool {
        self.domain() == other.domain()
    }

    /// Compact dotted form: domain then one segment per level
    ///
    /// `0x00000001.02.01` is child 1 of child 2 of top hat 1.
    pub fn path(&self) -> String {
        let mut path = format!("0x{:08x}", self.domain());
        for segment in &self.segments()[..self.level()] {
            path.push_str(&format!(".{:02x}", segment));
        }
        path
    }

    fn parse_path(s: &str) -> Result<Self> {
        let mut parts = s.split('.');
        let domain = parts
            .next()
            .map(|part| part.trim_start_matches("0x"))
            .ok_or_else(|| CoreError::parse("empty hat path"))?;
        let domain = u32::from_str_radix(domain, 16)
            .map_err(|e| CoreError::parse(format!("bad domain '{}': {}", domain, e)))?;

        let mut id = HatId::top_hat(domain)?;
        for part in parts {
            let index = u8::from_str_radix(part, 16)
                .map_err(|e| CoreError::parse(format!("bad segment '{}': {}", part, e)))?;
            id = id.build_child(index)?;
        }
        Ok(id)
    }
}

impl FromStr for HatId {
    type Err = CoreError;

    /// Accepts the canonical 64-digit hex form (optional `0x`) or the dotted
    /// path form produced by [`HatId::path`].
    fn from_str(s: &str) -> Result<Self> {
        if s.contains('.') {
            return Self::parse_path(s);
        }

        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != HAT_ID_BYTES * 2 {
            return Err(CoreError::parse(format!(
                "expected {} hex digits, got {}",
                HAT_ID_BYTES * 2,
                digits.len()
            )));
        }

        let mut bytes = [0u8; HAT_ID_BYTES];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| CoreError::parse(e.to_string()))?;
        Self::from_bytes(bytes)
    }
}

impl TryFrom<[u8; HAT_ID_BYTES]> for HatId {
    type Error = CoreError;

    fn try_from(bytes: [u8; HAT_ID_BYTES]) -> Result<Self> {
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for HatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for HatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HatId({})", self.path())
    }
}

impl Serialize for HatId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HatId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
