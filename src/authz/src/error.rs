//! Error types for the hats lifecycle controller

use hats_core::{AuthorityError, CoreError, HatId, Identity, LedgerError};
use thiserror::Error;

/// Hats controller errors
///
/// Every error aborts the operation that raised it with no state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HatsError {
    /// Caller wears no admin hat of the target
    #[error("{caller} is not an admin of {hat}")]
    NotAdmin { caller: Identity, hat: HatId },

    /// Caller holds no unit of the hat
    #[error("{caller} is not wearing {hat}")]
    NotWearer { caller: Identity, hat: HatId },

    /// Caller is not the hat's eligibility authority
    #[error("{caller} is not the eligibility authority of {hat}")]
    NotEligibilityAuthority { caller: Identity, hat: HatId },

    /// Caller is not the hat's status authority
    #[error("{caller} is not the status authority of {hat}")]
    NotStatusAuthority { caller: Identity, hat: HatId },

    /// Supply cap reached
    #[error("all {max_supply} units of {hat} are worn")]
    AllHatsWorn { hat: HatId, max_supply: u32 },

    /// The admin already handed out its last child index
    #[error("all child indices under {admin} are used")]
    AllLevelsUsed { admin: HatId },

    /// The admin sits at the deepest level
    #[error("{admin} is at maximum depth")]
    DepthExceeded { admin: HatId },

    /// Reference to a hat that was never created
    #[error("hat not found: {0}")]
    NotFound(HatId),

    /// A consulted authority failed or has no implementation
    #[error("authority {authority} failed: {reason}")]
    ExternalAuthorityFailure {
        authority: Identity,
        reason: AuthorityError,
    },

    /// Wearer already holds the hat
    #[error("{wearer} already wears {hat}")]
    AlreadyWearingHat { wearer: Identity, hat: HatId },

    /// Wearer is ineligible or in bad standing
    #[error("{wearer} is not eligible for {hat}")]
    NotEligible { wearer: Identity, hat: HatId },

    /// Hat is inactive
    #[error("hat {0} is not active")]
    HatNotActive(HatId),

    /// Hat properties are frozen
    #[error("hat {0} is immutable")]
    Immutable(HatId),

    /// New cap below current supply
    #[error("new max supply {requested} for {hat} is below current supply {supply}")]
    NewMaxSupplyTooLow {
        hat: HatId,
        requested: u32,
        supply: u32,
    },

    /// Hat authority changed while one of its queries was in flight
    #[error("authority of {0} changed during query")]
    StaleAuthorityQuery(HatId),

    /// Every top hat domain has been handed out
    #[error("top hat domains exhausted")]
    DomainsExhausted,

    /// Malformed argument
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Ledger bookkeeping error
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl HatsError {
    /// Stable snake_case name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            HatsError::NotAdmin { .. } => "not_admin",
            HatsError::NotWearer { .. } => "not_wearer",
            HatsError::NotEligibilityAuthority { .. } => "not_eligibility_authority",
            HatsError::NotStatusAuthority { .. } => "not_status_authority",
            HatsError::AllHatsWorn { .. } => "all_hats_worn",
            HatsError::AllLevelsUsed { .. } => "all_levels_used",
            HatsError::DepthExceeded { .. } => "depth_exceeded",
            HatsError::NotFound(_) => "not_found",
            HatsError::ExternalAuthorityFailure { .. } => "external_authority_failure",
            HatsError::AlreadyWearingHat { .. } => "already_wearing_hat",
            HatsError::NotEligible { .. } => "not_eligible",
            HatsError::HatNotActive(_) => "hat_not_active",
            HatsError::Immutable(_) => "immutable",
            HatsError::NewMaxSupplyTooLow { .. } => "new_max_supply_too_low",
            HatsError::StaleAuthorityQuery(_) => "stale_authority_query",
            HatsError::DomainsExhausted => "domains_exhausted",
            HatsError::InvalidInput(_) => "invalid_input",
            HatsError::Ledger(_) => "ledger",
        }
    }

    /// Map a codec error raised while placing a child under `admin`
    pub(crate) fn from_codec(admin: HatId, err: CoreError) -> Self {
        match err {
            CoreError::DepthExceeded { .. } => HatsError::DepthExceeded { admin },
            other => HatsError::InvalidInput(other.to_string()),
        }
    }
}

/// Codec errors without an admin context are input errors
///
/// `DepthExceeded` names the admin it was raised under, so child placement
/// goes through [`HatsError::from_codec`] instead.
impl From<CoreError> for HatsError {
    fn from(err: CoreError) -> Self {
        HatsError::InvalidInput(err.to_string())
    }
}

/// Result type for hats operations
pub type Result<T> = std::result::Result<T, HatsError>;
