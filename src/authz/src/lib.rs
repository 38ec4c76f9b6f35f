//! # Hats Authorization Tree
//!
//! Hierarchical roles ("hats") whose identifiers encode their whole admin
//! chain, with a lifecycle controller for creating, minting, revoking and
//! toggling them.
//!
//! ## Features
//!
//! - **Structural ancestry**: admin rights are read off identifier bits
//! - **Delegated authorities** for wearer eligibility and hat status, queried live
//! - **Async-first design** using Tokio runtime
//! - **Atomic operations**: every operation lands completely or not at all
//! - **Notifications** for every state transition
//!
//! ## Example
//!
//! ```rust
//! use hats_authz::{Hats, HatsConfig, Identity, NewHat};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hats = Hats::new(HatsConfig::default());
//!     let owner = Identity::new("user:founder");
//!     let alice = Identity::new("user:alice");
//!
//!     let top = hats.create_top_hat(&owner, "Acme DAO", "").await?;
//!     let council = hats.create_hat(&owner, NewHat::new(top, "Council", 5)).await?;
//!     hats.mint(&owner, council, &alice).await?;
//!
//!     if hats.is_wearer_of_hat(&alice, council).await? {
//!         println!("Alice sits on the council");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod authority;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use authority::AuthorityDirectory;
pub use engine::{Hats, HatsConfig, HatsMetrics, MetricsCollector};
pub use error::{HatsError, Result};
pub use events::{EventLog, EventRecord, EventSink, HatsEvent};
pub use ledger::InMemoryLedger;
pub use registry::HatRegistry;
pub use types::{Authority, Hat, NewHat};

pub use hats_core::{
    AuthorityError, BalanceLedger, EligibilityAuthority, HatId, Identity, StatusAuthority,
    WearerStatus, MAX_LEVELS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
