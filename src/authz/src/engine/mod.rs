//! Lifecycle controller
//!
//! Orchestrates the registry, admin checks, the balance ledger and the two
//! delegated authorities. Every mutating operation runs its validation and
//! its effects under one write lock on the shared state, so an operation
//! either lands completely or not at all.
//!
//! # Live authority queries
//!
//! Authorities are untrusted and may call back into the controller. A live
//! query therefore always runs with no lock held:
//!
//! ```text
//! read lock: validate, capture authorities ─► query (no lock) ─► write lock:
//!     re-validate, authorities unchanged? ─► mutate ─► notify
//! ```
//!
//! If a hat's authority changed while its query was in flight the operation
//! fails with `StaleAuthorityQuery` and nothing is mutated.

mod changes;
pub mod metrics;
mod status;
mod wearers;

pub use metrics::{HatsMetrics, MetricsCollector, Operation};

use crate::admin;
use crate::authority::AuthorityDirectory;
use crate::error::{HatsError, Result};
use crate::events::{EventLog, HatsEvent};
use crate::ledger::InMemoryLedger;
use crate::registry::HatRegistry;
use crate::types::{Authority, Hat, NewHat};
use hats_core::{AuthorityError, BalanceLedger, HatId, Identity, WearerStatus};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Controller configuration
#[derive(Debug, Clone)]
pub struct HatsConfig {
    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Number of notifications retained in memory
    pub event_log_capacity: usize,

    /// Upper bound on a single live authority query; `None` waits forever
    pub authority_timeout: Option<Duration>,
}

impl Default for HatsConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            event_log_capacity: 10_000,
            authority_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// State guarded by the controller lock
pub(crate) struct HatsState {
    pub(crate) registry: HatRegistry,
    pub(crate) ledger: Box<dyn BalanceLedger>,
}

impl HatsState {
    fn units_held(&self, holder: &Identity, hat: HatId) -> u64 {
        self.ledger.units_held(holder, hat)
    }

    /// Remove one unit from `holder` and shrink the supply to match
    fn burn(&mut self, holder: &Identity, hat: HatId) -> Result<()> {
        self.ledger.debit_unit(holder, hat)?;
        let record = self.registry.view_mut(hat)?;
        record.supply = record.supply.saturating_sub(1);
        Ok(())
    }
}

/// Authorities of a hat captured before a live query
#[derive(Debug, Clone)]
pub(crate) struct Delegates {
    pub(crate) eligibility: Authority,
    pub(crate) status: Authority,

    /// Stored active flag at capture time; only consulted when status is
    /// self-governed
    pub(crate) active: bool,
}

impl Delegates {
    pub(crate) fn of(hat: &Hat) -> Self {
        Self {
            eligibility: hat.eligibility_authority.clone(),
            status: hat.status_authority.clone(),
            active: hat.active,
        }
    }

    /// Same eligibility and status authorities; the active flag is ignored
    fn same_authorities(&self, other: &Delegates) -> bool {
        self.eligibility == other.eligibility && self.status == other.status
    }
}

/// Answers obtained from external authorities; `None` means self-governed
/// (or, for `wearer`, not asked because the hat is inactive)
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LiveVerdict {
    pub(crate) active: Option<bool>,
    pub(crate) wearer: Option<WearerStatus>,
}

/// Hats lifecycle controller
///
/// Cheap to clone; clones share the same tree.
///
/// # Architecture
///
/// ```text
/// caller ─► admin checks ─► HatRegistry ◄─► BalanceLedger
///                │
///                └─► AuthorityDirectory ─► eligibility / status authorities
///                                │
///                          [EventLog]  [Metrics]
/// ```
#[derive(Clone)]
pub struct Hats {
    state: Arc<RwLock<HatsState>>,

    /// Implementations behind authority identities
    authorities: Arc<AuthorityDirectory>,

    /// Notification history and fan-out
    events: Arc<EventLog>,

    metrics: Option<Arc<MetricsCollector>>,

    config: HatsConfig,
}

impl Hats {
    /// Create a controller backed by an in-memory ledger
    pub fn new(config: HatsConfig) -> Self {
        Self::with_ledger(config, Box::new(InMemoryLedger::new()))
    }

    /// Create a controller over an existing ledger
    pub fn with_ledger(config: HatsConfig, ledger: Box<dyn BalanceLedger>) -> Self {
        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            "Hats controller initialized with metrics={}, event_log_capacity={}, authority_timeout={:?}",
            config.enable_metrics, config.event_log_capacity, config.authority_timeout
        );

        Self {
            state: Arc::new(RwLock::new(HatsState {
                registry: HatRegistry::new(),
                ledger,
            })),
            authorities: Arc::new(AuthorityDirectory::new()),
            events: Arc::new(EventLog::new(config.event_log_capacity)),
            metrics,
            config,
        }
    }

    pub fn config(&self) -> &HatsConfig {
        &self.config
    }

    /// Directory used to resolve authority identities
    pub fn authorities(&self) -> &AuthorityDirectory {
        &self.authorities
    }

    /// Notification log
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Get controller metrics
    pub async fn get_metrics(&self) -> Option<HatsMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    /// Metrics in Prometheus text format
    pub async fn export_prometheus(&self) -> Option<String> {
        match &self.metrics {
            Some(metrics) => Some(metrics.export_prometheus().await),
            None => None,
        }
    }

    // ---------------------------------------------------------------------
    // Registry queries
    // ---------------------------------------------------------------------

    /// Snapshot of a hat record
    pub async fn view(&self, hat: HatId) -> Result<Hat> {
        self.state.read().await.registry.view(hat).cloned()
    }

    /// Whether `hat` was ever created
    pub async fn exists(&self, hat: HatId) -> bool {
        self.state.read().await.registry.contains(hat)
    }

    /// Identifier the next hat created under `admin` would receive
    pub async fn next_child_id(&self, admin: HatId) -> Result<HatId> {
        self.state.read().await.registry.next_child_id(admin)
    }

    /// Direct children created under `admin`
    pub async fn children(&self, admin: HatId) -> Vec<HatId> {
        self.state.read().await.registry.children(admin)
    }

    /// Number of top hats created so far
    pub async fn top_hat_count(&self) -> u32 {
        self.state.read().await.registry.top_hat_count()
    }

    /// Units of `hat` held by `holder`
    pub async fn balance_of(&self, holder: &Identity, hat: HatId) -> u64 {
        self.state.read().await.units_held(holder, hat)
    }

    /// Identities holding at least one unit of `hat`
    pub async fn holders(&self, hat: HatId) -> Result<Vec<Identity>> {
        let state = self.state.read().await;
        state.registry.view(hat)?;
        Ok(state.ledger.holders(hat))
    }

    /// Whether `caller` currently administers `hat`
    pub async fn is_admin_of_hat(&self, caller: &Identity, hat: HatId) -> Result<bool> {
        let state = self.state.read().await;
        state.registry.view(hat)?;
        Ok(admin::caller_is_admin(state.ledger.as_ref(), caller, hat))
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    /// Create a new top hat and make `owner` its wearer
    ///
    /// Needs no admin rights. Each top hat gets a fresh domain, so trees never
    /// collide.
    pub async fn create_top_hat(
        &self,
        owner: &Identity,
        details: impl Into<String>,
        image_uri: impl Into<String>,
    ) -> Result<HatId> {
        let details = details.into();
        let image_uri = image_uri.into();

        let result = {
            let mut state = self.state.write().await;
            self.insert_top_hat(&mut state, owner, details, image_uri)
        };

        self.observe(Operation::CreateTopHat, result).await
    }

    fn insert_top_hat(
        &self,
        state: &mut HatsState,
        owner: &Identity,
        details: String,
        image_uri: String,
    ) -> Result<HatId> {
        let id = state.registry.next_top_hat_id()?;
        state.ledger.credit_unit(owner, id)?;

        let inserted = state.registry.insert_top_hat(details, image_uri);
        let id = match inserted {
            Ok(id) => id,
            Err(e) => {
                state.ledger.debit_unit(owner, id)?;
                return Err(e);
            }
        };

        let record = state.registry.view_mut(id)?;
        record.supply = 1;
        let created = Self::created_event(record);

        self.events.record(created);
        self.events.record(HatsEvent::HatMinted {
            hat: id,
            wearer: owner.clone(),
            operator: owner.clone(),
        });

        info!("Top hat {} created for {}", id.path(), owner);
        Ok(id)
    }

    /// Create a hat under `params.admin`
    ///
    /// The caller must wear the admin hat or one of its ancestors.
    pub async fn create_hat(&self, caller: &Identity, params: NewHat) -> Result<HatId> {
        let result = {
            let mut state = self.state.write().await;
            self.insert_hat(&mut state, caller, &params)
        };

        self.observe(Operation::CreateHat, result).await
    }

    fn insert_hat(&self, state: &mut HatsState, caller: &Identity, params: &NewHat) -> Result<HatId> {
        state.registry.view(params.admin)?;
        let via = admin::check_creator(state.ledger.as_ref(), caller, params.admin)?;
        debug!(
            "{} creates under {} via {}",
            caller,
            params.admin.path(),
            via.path()
        );

        let id = state.registry.insert_child(params)?;
        let created = Self::created_event(state.registry.view(id)?);
        self.events.record(created);

        info!(
            "Hat {} created by {} (max_supply={})",
            id.path(),
            caller,
            params.max_supply
        );
        Ok(id)
    }

    fn created_event(hat: &Hat) -> HatsEvent {
        HatsEvent::HatCreated {
            hat: hat.id,
            admin: hat.admin,
            details: hat.details.clone(),
            max_supply: hat.max_supply,
            eligibility_authority: hat.eligibility_authority.clone(),
            status_authority: hat.status_authority.clone(),
            mutable: hat.mutable,
            image_uri: hat.image_uri.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // Authority queries
    // ---------------------------------------------------------------------

    /// Authorities of `hat` as currently recorded
    async fn delegates(&self, hat: HatId) -> Result<Delegates> {
        let state = self.state.read().await;
        Ok(Delegates::of(state.registry.view(hat)?))
    }

    /// Query every external authority of `hat` relevant to `wearer`
    async fn live_verdict(
        &self,
        hat: HatId,
        delegates: &Delegates,
        wearer: &Identity,
    ) -> Result<LiveVerdict> {
        let active = match &delegates.status {
            Authority::External(authority) => Some(self.query_status(authority, hat).await?),
            Authority::SelfGoverned => None,
        };

        // An inactive hat cannot be worn whatever the wearer's status. The
        // verdict pins the inactive answer so the write phase never proceeds
        // without the eligibility query it skipped here.
        if !active.unwrap_or(delegates.active) {
            return Ok(LiveVerdict {
                active: Some(false),
                wearer: None,
            });
        }

        let wearer = match &delegates.eligibility {
            Authority::External(authority) => {
                Some(self.query_eligibility(authority, wearer, hat).await?)
            }
            Authority::SelfGoverned => None,
        };

        Ok(LiveVerdict { active, wearer })
    }

    /// Ask `authority` whether `hat` is active
    async fn query_status(&self, authority: &Identity, hat: HatId) -> Result<bool> {
        let implementation = self
            .authorities
            .status(authority)
            .ok_or_else(|| Self::unavailable(authority, "status"))?;

        debug!("Querying status authority {} for {}", authority, hat.path());
        self.run_query(authority, implementation.get_hat_status(hat))
            .await
    }

    /// Ask `authority` for the status of `wearer` on `hat`
    async fn query_eligibility(
        &self,
        authority: &Identity,
        wearer: &Identity,
        hat: HatId,
    ) -> Result<WearerStatus> {
        let implementation = self
            .authorities
            .eligibility(authority)
            .ok_or_else(|| Self::unavailable(authority, "eligibility"))?;

        debug!(
            "Querying eligibility authority {} for {} on {}",
            authority,
            wearer,
            hat.path()
        );
        self.run_query(authority, implementation.get_wearer_status(wearer, hat))
            .await
    }

    /// Await one authority answer, bounded by the configured timeout
    async fn run_query<T, F>(&self, authority: &Identity, query: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, AuthorityError>>,
    {
        let start = Instant::now();

        let outcome = match self.config.authority_timeout {
            Some(limit) => match tokio::time::timeout(limit, query).await {
                Ok(outcome) => outcome,
                Err(_) => Err(AuthorityError::Timeout(limit)),
            },
            None => query.await,
        };

        if let Some(metrics) = &self.metrics {
            metrics
                .record_authority_query(start.elapsed(), outcome.is_ok())
                .await;
        }

        outcome.map_err(|reason| {
            warn!("Authority {} failed: {}", authority, reason);
            HatsError::ExternalAuthorityFailure {
                authority: authority.clone(),
                reason,
            }
        })
    }

    fn unavailable(authority: &Identity, kind: &str) -> HatsError {
        warn!("No {} implementation registered for {}", kind, authority);
        HatsError::ExternalAuthorityFailure {
            authority: authority.clone(),
            reason: AuthorityError::Unavailable(format!(
                "no {} implementation registered for {}",
                kind, authority
            )),
        }
    }

    /// Record the outcome of an operation
    async fn observe<T>(&self, operation: Operation, result: Result<T>) -> Result<T> {
        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(_) => metrics.record_operation(operation).await,
                Err(_) => metrics.record_failure().await,
            }
        }

        if let Err(e) = &result {
            debug!("{:?} rejected: {}", operation, e);
        }

        result
    }
}

impl Default for Hats {
    fn default() -> Self {
        Self::new(HatsConfig::default())
    }
}

/// Fail with `StaleAuthorityQuery` when `hat`'s authorities moved during a query
fn ensure_unchanged(hat: &Hat, captured: &Delegates) -> Result<()> {
    if !Delegates::of(hat).same_authorities(captured) {
        warn!("Authorities of {} changed during a live query", hat.id.path());
        return Err(HatsError::StaleAuthorityQuery(hat.id));
    }
    Ok(())
}

/// Whether `wearer` may hold `hat`, combining live answers with local flags
fn check_wearable(state: &HatsState, hat: &Hat, wearer: &Identity, verdict: LiveVerdict) -> Result<()> {
    if !verdict.active.unwrap_or(hat.active) {
        return Err(HatsError::HatNotActive(hat.id));
    }

    let permitted = match verdict.wearer {
        Some(status) => status.permits_wearing(),
        None => !state.registry.is_in_bad_standing(wearer, hat.id),
    };
    if !permitted {
        return Err(HatsError::NotEligible {
            wearer: wearer.clone(),
            hat: hat.id,
        });
    }

    Ok(())
}
