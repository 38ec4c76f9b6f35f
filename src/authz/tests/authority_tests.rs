//! Live queries against external eligibility and status authorities,
//! failure propagation, timeouts and reentrancy.

mod common;

use common::{
    id, tree, FailingAuthority, ReentrantAuthority, Reentry, SlowStatus, SwitchStatus,
    TableEligibility,
};
use hats_authz::{Authority, AuthorityError, Hats, HatsConfig, HatsError, HatsEvent, NewHat};
use std::sync::Arc;
use std::time::Duration;

const STAKING: &str = "module:staking";
const TOGGLE: &str = "module:toggle";

fn staking_hat(top: hats_authz::HatId) -> NewHat {
    NewHat::new(top, "Staked operators", 3).with_eligibility(Authority::external(STAKING))
}

fn toggled_hat(top: hats_authz::HatId) -> NewHat {
    NewHat::new(top, "Seasonal role", 3).with_status(Authority::external(TOGGLE))
}

// ============================================================================
// ELIGIBILITY
// ============================================================================

#[tokio::test]
async fn test_ineligible_wearer_cannot_be_minted() {
    let t = tree(staking_hat).await;
    let eligibility = TableEligibility::new();
    t.hats.authorities().register_eligibility(STAKING, eligibility.clone());

    let alice = id("user:alice");
    eligibility.set(&alice, false, true);

    assert_eq!(
        t.hats.mint(&t.owner, t.hat, &alice).await.unwrap_err(),
        HatsError::NotEligible { wearer: alice.clone(), hat: t.hat }
    );

    eligibility.set(&alice, true, true);
    t.hats.mint(&t.owner, t.hat, &alice).await.unwrap();
    assert!(t.hats.is_wearer_of_hat(&alice, t.hat).await.unwrap());
}

#[tokio::test]
async fn test_predicates_query_live_without_mutating() {
    let t = tree(staking_hat).await;
    let eligibility = TableEligibility::new();
    t.hats.authorities().register_eligibility(STAKING, eligibility.clone());

    let alice = id("user:alice");
    t.hats.mint(&t.owner, t.hat, &alice).await.unwrap();
    let events_before = t.hats.events().total_recorded();

    eligibility.set(&alice, false, false);
    assert!(!t.hats.is_wearer_of_hat(&alice, t.hat).await.unwrap());
    assert!(!t.hats.is_in_good_standing(&alice, t.hat).await.unwrap());
    assert!(!t.hats.is_eligible(&alice, t.hat).await.unwrap());

    // Nothing applied: unit and supply intact, no notifications
    assert_eq!(t.hats.balance_of(&alice, t.hat).await, 1);
    assert_eq!(t.hats.view(t.hat).await.unwrap().supply, 1);
    assert_eq!(t.hats.events().total_recorded(), events_before);

    eligibility.set(&alice, true, true);
    assert!(t.hats.is_wearer_of_hat(&alice, t.hat).await.unwrap());
}

#[tokio::test]
async fn test_eligibility_sync_applies_revocation() {
    let t = tree(staking_hat).await;
    let eligibility = TableEligibility::new();
    t.hats.authorities().register_eligibility(STAKING, eligibility.clone());

    let alice = id("user:alice");
    t.hats.mint(&t.owner, t.hat, &alice).await.unwrap();

    eligibility.set(&alice, false, false);
    let status = t.hats.get_eligibility_status(t.hat, &alice).await.unwrap();

    assert!(!status.eligible);
    assert_eq!(t.hats.balance_of(&alice, t.hat).await, 0);
    assert_eq!(t.hats.view(t.hat).await.unwrap().supply, 0);

    let last = t.hats.events().history().pop().unwrap();
    assert_eq!(
        last.event,
        HatsEvent::WearerStatusChanged {
            hat: t.hat,
            wearer: alice.clone(),
            eligible: false,
            standing: false,
            burned: true,
        }
    );
}

#[tokio::test]
async fn test_eligibility_sync_without_change_is_silent() {
    let t = tree(staking_hat).await;
    let eligibility = TableEligibility::new();
    t.hats.authorities().register_eligibility(STAKING, eligibility.clone());

    let alice = id("user:alice");
    t.hats.mint(&t.owner, t.hat, &alice).await.unwrap();
    let recorded = t.hats.events().total_recorded();

    let status = t.hats.get_eligibility_status(t.hat, &alice).await.unwrap();

    assert!(status.permits_wearing());
    assert_eq!(eligibility.queries(), 2);
    assert_eq!(t.hats.events().total_recorded(), recorded);
}

// ============================================================================
// STATUS
// ============================================================================

#[tokio::test]
async fn test_external_status_is_queried_live() {
    let t = tree(toggled_hat).await;
    let toggle = SwitchStatus::new(true);
    t.hats.authorities().register_status(TOGGLE, toggle.clone());

    let alice = id("user:alice");
    t.hats.mint(&t.owner, t.hat, &alice).await.unwrap();

    toggle.set_active(false);
    assert!(!t.hats.is_active(t.hat).await.unwrap());
    assert!(!t.hats.is_wearer_of_hat(&alice, t.hat).await.unwrap());
    // The stored flag is only a cache and was not touched
    assert!(t.hats.view(t.hat).await.unwrap().active);

    toggle.set_active(true);
    assert!(t.hats.is_wearer_of_hat(&alice, t.hat).await.unwrap());
}

#[tokio::test]
async fn test_status_sync_stores_answer() {
    let t = tree(toggled_hat).await;
    let toggle = SwitchStatus::new(false);
    t.hats.authorities().register_status(TOGGLE, toggle.clone());
    let recorded = t.hats.events().total_recorded();

    assert!(!t.hats.get_active_status(t.hat).await.unwrap());
    assert!(!t.hats.view(t.hat).await.unwrap().active);
    assert_eq!(t.hats.events().total_recorded(), recorded + 1);

    // Same answer again: no change, no notification
    assert!(!t.hats.get_active_status(t.hat).await.unwrap());
    assert_eq!(t.hats.events().total_recorded(), recorded + 1);
    assert_eq!(toggle.queries(), 2);
}

#[tokio::test]
async fn test_self_governed_status_needs_no_query() {
    let t = tree(|top| NewHat::new(top, "Plain", 1)).await;
    assert!(t.hats.get_active_status(t.hat).await.unwrap());

    let metrics = t.hats.get_metrics().await.unwrap();
    assert_eq!(metrics.authority_queries, 0);
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn test_missing_implementation_fails_loudly() {
    let t = tree(toggled_hat).await;
    let alice = id("user:alice");

    let err = t.hats.mint(&t.owner, t.hat, &alice).await.unwrap_err();
    match err {
        HatsError::ExternalAuthorityFailure { authority, reason } => {
            assert_eq!(authority, id(TOGGLE));
            assert!(matches!(reason, AuthorityError::Unavailable(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(t.hats.is_active(t.hat).await.is_err());
    assert_eq!(t.hats.view(t.hat).await.unwrap().supply, 0);
}

#[tokio::test]
async fn test_failing_authority_aborts_operation() {
    let t = tree(|top| staking_hat(top).with_status(Authority::external(TOGGLE))).await;
    t.hats
        .authorities()
        .register_eligibility(STAKING, Arc::new(FailingAuthority));
    t.hats.authorities().register_status(TOGGLE, Arc::new(FailingAuthority));
    let alice = id("user:alice");
    let recorded = t.hats.events().total_recorded();

    for err in [
        t.hats.mint(&t.owner, t.hat, &alice).await.unwrap_err(),
        t.hats.get_active_status(t.hat).await.unwrap_err(),
        t.hats.get_eligibility_status(t.hat, &alice).await.unwrap_err(),
    ] {
        assert!(
            matches!(
                err,
                HatsError::ExternalAuthorityFailure { reason: AuthorityError::Rejected(_), .. }
            ),
            "{err:?}"
        );
    }

    assert_eq!(t.hats.events().total_recorded(), recorded);
    let metrics = t.hats.get_metrics().await.unwrap();
    assert_eq!(metrics.authority_failures, 3);
}

#[tokio::test]
async fn test_slow_authority_times_out() {
    let hats = Hats::new(HatsConfig {
        authority_timeout: Some(Duration::from_millis(20)),
        ..HatsConfig::default()
    });
    let owner = id("user:owner");
    let top = hats.create_top_hat(&owner, "Acme", "").await.unwrap();
    let hat = hats.create_hat(&owner, toggled_hat(top)).await.unwrap();
    hats.authorities().register_status(
        TOGGLE,
        Arc::new(SlowStatus { delay: Duration::from_secs(5) }),
    );

    let err = hats.is_active(hat).await.unwrap_err();
    assert_eq!(
        err,
        HatsError::ExternalAuthorityFailure {
            authority: id(TOGGLE),
            reason: AuthorityError::Timeout(Duration::from_millis(20)),
        }
    );
}

// ============================================================================
// REENTRANCY
// ============================================================================

#[tokio::test]
async fn test_authority_swapped_mid_query_is_stale() {
    let t = tree(toggled_hat).await;
    let reentrant = ReentrantAuthority::new(
        t.hats.clone(),
        Reentry::ChangeToggle { caller: t.owner.clone(), authority: Authority::SelfGoverned },
        false,
    );
    t.hats.authorities().register_status(TOGGLE, reentrant.clone());

    let err = t.hats.get_active_status(t.hat).await.unwrap_err();

    assert!(reentrant.reentered());
    assert_eq!(err, HatsError::StaleAuthorityQuery(t.hat));
    // The stale answer (inactive) was not applied
    let record = t.hats.view(t.hat).await.unwrap();
    assert!(record.active);
    assert_eq!(record.status_authority, Authority::SelfGoverned);
}

#[tokio::test]
async fn test_reentrant_mint_is_revalidated() {
    let t = tree(toggled_hat).await;
    let alice = id("user:alice");
    let reentrant = ReentrantAuthority::new(
        t.hats.clone(),
        Reentry::Mint { caller: t.owner.clone(), wearer: alice.clone() },
        true,
    );
    t.hats.authorities().register_status(TOGGLE, reentrant.clone());

    // The authority mints alice while answering; the outer mint sees it
    let err = t.hats.mint(&t.owner, t.hat, &alice).await.unwrap_err();

    assert_eq!(err, HatsError::AlreadyWearingHat { wearer: alice.clone(), hat: t.hat });
    assert_eq!(t.hats.balance_of(&alice, t.hat).await, 1);
    assert_eq!(t.hats.view(t.hat).await.unwrap().supply, 1);
}

#[tokio::test]
async fn test_reentrant_eligibility_swap_is_stale() {
    let t = tree(staking_hat).await;
    let alice = id("user:alice");
    let reentrant = ReentrantAuthority::new(
        t.hats.clone(),
        Reentry::ChangeToggle { caller: t.owner.clone(), authority: Authority::external(TOGGLE) },
        true,
    );
    t.hats.authorities().register_eligibility(STAKING, reentrant);

    // Changing the status authority also invalidates the captured authorities
    let err = t.hats.mint(&t.owner, t.hat, &alice).await.unwrap_err();
    assert_eq!(err, HatsError::StaleAuthorityQuery(t.hat));
    assert_eq!(t.hats.balance_of(&alice, t.hat).await, 0);
}
