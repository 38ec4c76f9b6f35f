//! Notifications: exactly one per successful transition, none on failure.

mod common;

use common::{id, tree};
use hats_authz::{Authority, EventRecord, EventSink, HatsEvent, NewHat};
use parking_lot::Mutex;
use std::sync::Arc;

fn kinds(records: &[EventRecord]) -> Vec<&'static str> {
    records.iter().map(|record| record.event.kind()).collect()
}

#[tokio::test]
async fn test_one_event_per_transition() {
    let t = tree(|top| NewHat::new(top, "Council", 2)).await;
    let alice = id("user:alice");
    let bob = id("user:bob");
    let start = t.hats.events().total_recorded();

    t.hats.mint(&t.owner, t.hat, &alice).await.unwrap();
    t.hats.transfer_hat(&t.owner, t.hat, &alice, &bob).await.unwrap();
    t.hats
        .set_hat_wearer_status(&t.owner, t.hat, &bob, true, false)
        .await
        .unwrap();
    t.hats.set_hat_status(&t.owner, t.hat, false).await.unwrap();
    t.hats.set_hat_status(&t.owner, t.hat, false).await.unwrap();
    t.hats.renounce(&bob, t.hat).await.unwrap();
    t.hats.change_hat_details(&t.owner, t.hat, "Council v2").await.unwrap();
    t.hats.change_hat_max_supply(&t.owner, t.hat, 4).await.unwrap();
    t.hats.make_hat_immutable(&t.owner, t.hat).await.unwrap();

    let records = t.hats.events().since(start);
    assert_eq!(
        kinds(&records),
        vec![
            "hat_minted",
            "hat_transferred",
            "wearer_status_changed",
            "hat_status_changed",
            "hat_status_changed",
            "hat_renounced",
            "hat_details_changed",
            "hat_max_supply_changed",
            "hat_made_immutable",
        ]
    );

    let sequences: Vec<u64> = records.iter().map(|r| r.sequence).collect();
    let expected: Vec<u64> = (start + 1..=start + 9).collect();
    assert_eq!(sequences, expected);
}

#[tokio::test]
async fn test_creation_events() {
    let t = tree(|top| {
        NewHat::new(top, "Council", 2)
            .with_eligibility(Authority::external("module:staking"))
            .with_image_uri("ipfs://council")
    })
    .await;

    let history = t.hats.events().history();
    assert_eq!(kinds(&history), vec!["hat_created", "hat_minted", "hat_created"]);

    match &history[2].event {
        HatsEvent::HatCreated {
            hat,
            admin,
            eligibility_authority,
            image_uri,
            mutable,
            ..
        } => {
            assert_eq!(*hat, t.hat);
            assert_eq!(*admin, Some(t.top));
            assert_eq!(*eligibility_authority, Authority::external("module:staking"));
            assert_eq!(image_uri, "ipfs://council");
            assert!(*mutable);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_failures_emit_nothing() {
    let t = tree(|top| NewHat::new(top, "Council", 1).immutable()).await;
    let alice = id("user:alice");
    let outsider = id("user:outsider");
    t.hats.mint(&t.owner, t.hat, &alice).await.unwrap();
    let recorded = t.hats.events().total_recorded();

    assert!(t.hats.mint(&t.owner, t.hat, &outsider).await.is_err());
    assert!(t.hats.mint(&outsider, t.hat, &outsider).await.is_err());
    assert!(t.hats.renounce(&outsider, t.hat).await.is_err());
    assert!(t.hats.set_hat_status(&outsider, t.hat, false).await.is_err());
    assert!(t.hats.change_hat_details(&t.owner, t.hat, "x").await.is_err());
    assert!(t.hats.create_hat(&outsider, NewHat::new(t.top, "x", 1)).await.is_err());

    assert_eq!(t.hats.events().total_recorded(), recorded);
    let metrics = t.hats.get_metrics().await.unwrap();
    assert_eq!(metrics.failed_operations, 6);
}

#[tokio::test]
async fn test_subscribers_and_sinks_see_transitions() {
    struct Collect(Mutex<Vec<&'static str>>);

    impl EventSink for Collect {
        fn publish(&self, record: &EventRecord) {
            self.0.lock().push(record.event.kind());
        }
    }

    let t = tree(|top| NewHat::new(top, "Council", 2)).await;
    let sink = Arc::new(Collect(Mutex::new(Vec::new())));
    t.hats.events().add_sink(sink.clone());
    let mut feed = t.hats.events().subscribe();

    t.hats.mint(&t.owner, t.hat, &id("user:alice")).await.unwrap();

    let received = feed.recv().await.unwrap();
    assert_eq!(received.event.kind(), "hat_minted");
    assert_eq!(*sink.0.lock(), vec!["hat_minted"]);
}
