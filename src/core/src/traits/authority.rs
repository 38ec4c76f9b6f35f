//! Delegated authority contracts
//!
//! A hat may hand its wearer-eligibility and active-status decisions to
//! third parties. Implementations only answer queries; applying the answer is
//! the controller's job.

use crate::types::{HatId, Identity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure reported by (or on behalf of) an authority
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// No implementation answers for this authority
    #[error("authority unavailable: {0}")]
    Unavailable(String),

    /// The authority refused to answer
    #[error("authority rejected query: {0}")]
    Rejected(String),

    /// The authority did not answer in time
    #[error("authority timed out after {0:?}")]
    Timeout(Duration),
}

/// Verdict of an eligibility authority on one wearer of one hat
///
/// Report `eligible = false` to revoke the hat; [`WearerStatus::is_revoked`]
/// reads the verdict the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WearerStatus {
    /// Whether the wearer may keep (or receive) the hat
    pub eligible: bool,

    /// Whether the wearer is in good standing
    pub standing: bool,
}

impl WearerStatus {
    pub fn new(eligible: bool, standing: bool) -> Self {
        Self { eligible, standing }
    }

    /// Eligible and in good standing
    pub fn good() -> Self {
        Self::new(true, true)
    }

    /// Whether this verdict revokes the hat
    pub fn is_revoked(&self) -> bool {
        !self.eligible
    }

    /// Eligible and in good standing
    pub fn permits_wearing(&self) -> bool {
        self.eligible && self.standing
    }
}

impl Default for WearerStatus {
    fn default() -> Self {
        Self::good()
    }
}

/// Decides whether an identity may wear a hat
#[async_trait]
pub trait EligibilityAuthority: Send + Sync {
    /// Report `(eligible, standing)` for `wearer` on `hat`
    ///
    /// Must not mutate hats state itself; the controller applies the verdict.
    async fn get_wearer_status(
        &self,
        wearer: &Identity,
        hat: HatId,
    ) -> Result<WearerStatus, AuthorityError>;
}

/// Decides whether a hat is currently active
#[async_trait]
pub trait StatusAuthority: Send + Sync {
    /// Report whether `hat` is active
    async fn get_hat_status(&self, hat: HatId) -> Result<bool, AuthorityError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quorum {
        threshold: usize,
    }

    #[async_trait]
    impl EligibilityAuthority for Quorum {
        async fn get_wearer_status(
            &self,
            wearer: &Identity,
            _hat: HatId,
        ) -> Result<WearerStatus, AuthorityError> {
            if wearer.as_str().is_empty() {
                return Err(AuthorityError::Rejected("anonymous wearer".into()));
            }
            Ok(WearerStatus::new(wearer.as_str().len() >= self.threshold, true))
        }
    }

    #[test]
    fn test_wearer_status_verdicts() {
        assert!(WearerStatus::default().permits_wearing());
        assert!(!WearerStatus::new(true, false).permits_wearing());
        assert!(!WearerStatus::new(true, false).is_revoked());
        assert!(WearerStatus::new(false, true).is_revoked());
    }

    #[test]
    fn test_authority_as_trait_object() {
        let authority: Box<dyn EligibilityAuthority> = Box::new(Quorum { threshold: 8 });
        let hat = HatId::top_hat(1).unwrap();

        let long = tokio_test::block_on(authority.get_wearer_status(&Identity::new("user:alice"), hat));
        assert_eq!(long, Ok(WearerStatus::good()));

        let short = tokio_test::block_on(authority.get_wearer_status(&Identity::new("user:a"), hat));
        assert_eq!(short, Ok(WearerStatus::new(false, true)));

        let anonymous = tokio_test::block_on(authority.get_wearer_status(&Identity::new(""), hat));
        assert!(matches!(anonymous, Err(AuthorityError::Rejected(_))));
    }
}
