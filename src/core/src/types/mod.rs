//! Shared types for the hats authorization tree

pub mod hat_id;
pub mod identity;

// Re-export commonly used types
pub use hat_id::{HatId, HAT_ID_BYTES, LEVEL_BITS, MAX_CHILD_INDEX, MAX_LEVELS, TOP_HAT_BITS};
pub use identity::Identity;
