//! Transition notifications
//!
//! Every successful state transition produces exactly one [`EventRecord`].
//! Records are kept in a bounded in-memory history, fanned out to live
//! subscribers over a broadcast channel, and handed to any registered
//! [`EventSink`]. Failed operations never reach this module.

use crate::types::Authority;
use chrono::{DateTime, Utc};
use hats_core::{HatId, Identity};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Capacity of the live subscriber channel
const FEED_CAPACITY: usize = 1024;

/// A single state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HatsEvent {
    HatCreated {
        hat: HatId,
        admin: Option<HatId>,
        details: String,
        max_supply: u32,
        eligibility_authority: Authority,
        status_authority: Authority,
        mutable: bool,
        image_uri: String,
    },
    HatMinted {
        hat: HatId,
        wearer: Identity,
        operator: Identity,
    },
    HatTransferred {
        hat: HatId,
        from: Identity,
        to: Identity,
        operator: Identity,
    },
    HatRenounced {
        hat: HatId,
        wearer: Identity,
    },
    /// Eligibility verdict applied; `burned` when a held unit was revoked
    WearerStatusChanged {
        hat: HatId,
        wearer: Identity,
        eligible: bool,
        standing: bool,
        burned: bool,
    },
    HatStatusChanged {
        hat: HatId,
        active: bool,
    },
    HatDetailsChanged {
        hat: HatId,
        details: String,
    },
    HatImageUriChanged {
        hat: HatId,
        image_uri: String,
    },
    HatEligibilityChanged {
        hat: HatId,
        authority: Authority,
    },
    HatStatusAuthorityChanged {
        hat: HatId,
        authority: Authority,
    },
    HatMaxSupplyChanged {
        hat: HatId,
        max_supply: u32,
    },
    HatMadeImmutable {
        hat: HatId,
    },
}

impl HatsEvent {
    /// Hat the transition applies to
    pub fn hat(&self) -> HatId {
        match self {
            HatsEvent::HatCreated { hat, .. }
            | HatsEvent::HatMinted { hat, .. }
            | HatsEvent::HatTransferred { hat, .. }
            | HatsEvent::HatRenounced { hat, .. }
            | HatsEvent::WearerStatusChanged { hat, .. }
            | HatsEvent::HatStatusChanged { hat, .. }
            | HatsEvent::HatDetailsChanged { hat, .. }
            | HatsEvent::HatImageUriChanged { hat, .. }
            | HatsEvent::HatEligibilityChanged { hat, .. }
            | HatsEvent::HatStatusAuthorityChanged { hat, .. }
            | HatsEvent::HatMaxSupplyChanged { hat, .. }
            | HatsEvent::HatMadeImmutable { hat } => *hat,
        }
    }

    /// Short kind label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            HatsEvent::HatCreated { .. } => "hat_created",
            HatsEvent::HatMinted { .. } => "hat_minted",
            HatsEvent::HatTransferred { .. } => "hat_transferred",
            HatsEvent::HatRenounced { .. } => "hat_renounced",
            HatsEvent::WearerStatusChanged { .. } => "wearer_status_changed",
            HatsEvent::HatStatusChanged { .. } => "hat_status_changed",
            HatsEvent::HatDetailsChanged { .. } => "hat_details_changed",
            HatsEvent::HatImageUriChanged { .. } => "hat_image_uri_changed",
            HatsEvent::HatEligibilityChanged { .. } => "hat_eligibility_changed",
            HatsEvent::HatStatusAuthorityChanged { .. } => "hat_status_authority_changed",
            HatsEvent::HatMaxSupplyChanged { .. } => "hat_max_supply_changed",
            HatsEvent::HatMadeImmutable { .. } => "hat_made_immutable",
        }
    }
}

/// Sequenced, timestamped notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique record identifier
    pub id: Uuid,

    /// Position in the global transition order, starting at 1
    pub sequence: u64,

    pub recorded_at: DateTime<Utc>,

    pub event: HatsEvent,
}

/// External observer of transitions
pub trait EventSink: Send + Sync {
    fn publish(&self, record: &EventRecord);
}

struct LogState {
    records: VecDeque<EventRecord>,
    next_sequence: u64,
}

/// Bounded event history with live fan-out
pub struct EventLog {
    state: Mutex<LogState>,
    capacity: usize,
    feed: broadcast::Sender<EventRecord>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventLog {
    /// Create a log retaining at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            state: Mutex::new(LogState {
                records: VecDeque::with_capacity(capacity.min(FEED_CAPACITY)),
                next_sequence: 1,
            }),
            capacity,
            feed,
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Attach an additional observer
    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    /// Receive every record published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.feed.subscribe()
    }

    /// Sequence and publish one transition
    pub fn record(&self, event: HatsEvent) -> EventRecord {
        let record = {
            let mut state = self.state.lock();
            let record = EventRecord {
                id: Uuid::new_v4(),
                sequence: state.next_sequence,
                recorded_at: Utc::now(),
                event,
            };
            state.next_sequence += 1;

            if self.capacity > 0 {
                if state.records.len() == self.capacity {
                    state.records.pop_front();
                }
                state.records.push_back(record.clone());
            }
            record
        };

        debug!(
            "Event #{} {} on {}",
            record.sequence,
            record.event.kind(),
            record.event.hat().path()
        );

        // No subscribers is fine
        let _ = self.feed.send(record.clone());

        for sink in self.sinks.read().iter() {
            sink.publish(&record);
        }

        record
    }

    /// Retained records, oldest first
    pub fn history(&self) -> Vec<EventRecord> {
        self.state.lock().records.iter().cloned().collect()
    }

    /// Retained records with a sequence greater than `sequence`
    pub fn since(&self, sequence: u64) -> Vec<EventRecord> {
        self.state
            .lock()
            .records
            .iter()
            .filter(|record| record.sequence > sequence)
            .cloned()
            .collect()
    }

    /// Retained records about `hat`
    pub fn for_hat(&self, hat: HatId) -> Vec<EventRecord> {
        self.state
            .lock()
            .records
            .iter()
            .filter(|record| record.event.hat() == hat)
            .cloned()
            .collect()
    }

    /// Number of transitions recorded since creation (including evicted ones)
    pub fn total_recorded(&self) -> u64 {
        self.state.lock().next_sequence - 1
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
