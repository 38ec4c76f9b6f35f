//! Caller and wearer identities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, externally authenticated identity
///
/// The hosting environment vouches for every `Identity` it hands to the
/// controller; nothing here inspects or derives its contents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create a new identity
    pub fn new<S: Into<String>>(id: S) -> Self {
        Identity(id.into())
    }

    /// Get the identity as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Identity(s)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_transparent_in_json() {
        let alice = Identity::new("user:alice");
        assert_eq!(serde_json::to_string(&alice).unwrap(), "\"user:alice\"");
        assert_eq!(alice.to_string(), "user:alice");
        assert_eq!(Identity::from("user:alice"), alice);
    }
}
