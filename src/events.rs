// ============================================================================
// Observable Events - Crowdcast Consensus Market
// ============================================================================
//
// Event records are for indexers and UIs; correctness never depends on
// them. The engine appends one record per state-changing operation.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    MarketCreated {
        market_id: u64,
        creator: String,
        metadata_uri: String,
    },
    CommitmentCreated {
        market_id: u64,
        commitment_id: u64,
        owner: String,
        commitment_hash: String,
        wager: u64,
        weight: u64,
    },
    CommitmentRevealed {
        market_id: u64,
        commitment_id: u64,
        position: i64,
        weight: u64,
    },
    MarketResolved {
        market_id: u64,
        winning_threshold: u64,
        consensus_position: i64,
        winning_commitments: u64,
    },
    WinningsClaimed {
        market_id: u64,
        commitment_id: u64,
        owner: String,
        payout: u64,
    },
    WinningsAdded {
        market_id: u64,
        funder: String,
        amount: u64,
    },
}

/// A single emitted event with a unique id and the engine timestamp at
/// which the triggering operation ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(timestamp: u64, kind: EventKind) -> Self {
        Self {
            id: format!("evt_{}", Uuid::new_v4().simple()),
            timestamp,
            kind,
        }
    }
}
