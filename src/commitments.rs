// ============================================================================
// Commitment Ledger - Crowdcast Consensus Market
// ============================================================================
//
// Sealed commitments per market, keyed by a sequential id. A commitment
// binds (position, wager, nonce) behind a sha256 hash at commit time and
// is opened exactly once during the reveal window. The decay-adjusted
// weight is fixed at commit time and never recomputed.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use crate::errors::MarketError;
use crate::math::{mul_div, BPS_DENOMINATOR};
use crate::registry::Market;

/// Binding hash over the commitment triple. Reveal recomputes this over
/// the disclosed position and nonce plus the wager stored at commit time,
/// so none of the three can change after the fact.
pub fn commitment_hash(position: i64, wager: u64, nonce: &str) -> String {
    let preimage = format!("{}|{}|{}", position, wager, nonce);
    hex::encode(Sha256::digest(preimage.as_bytes()))
}

/// Commit-time weight: earlier commitments keep more of their wager as
/// influence. `decay = decay_factor * elapsed / commit_duration` floored
/// and clamped to basis-point range; the result is floored but never
/// zero, so every commitment keeps strictly positive influence.
pub fn decay_weight(
    wager: u64,
    decay_factor_bps: u64,
    elapsed: u64,
    commit_duration: u64,
) -> Result<u64, MarketError> {
    let decay = mul_div(decay_factor_bps, elapsed, commit_duration)?.min(BPS_DENOMINATOR);
    let weight = mul_div(wager, BPS_DENOMINATOR - decay, BPS_DENOMINATOR)?;
    Ok(weight.max(1))
}

/// A sealed (and later revealed) guess
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commitment {
    /// Sequential id within the market, starting at 1
    pub id: u64,

    /// Market this commitment belongs to
    pub market_id: u64,

    /// Address that committed; payouts always go here
    pub owner: String,

    /// sha256 binding of (position, wager, nonce)
    pub commitment_hash: String,

    /// Wager amount recorded at commit time
    pub wager: u64,

    /// Decay-adjusted weight, fixed at commit time
    pub weight: u64,

    /// Commit timestamp
    pub committed_at: u64,

    pub revealed: bool,
    pub claimed: bool,

    /// Disclosed position; None until revealed
    pub position: Option<i64>,

    /// Disclosed nonce; None until revealed
    pub nonce: Option<String>,
}

impl Commitment {
    /// Absolute distance from a consensus position, for revealed entries
    pub fn distance_from(&self, consensus_position: i64) -> Option<u64> {
        self.position.map(|p| p.abs_diff(consensus_position))
    }
}

/// Per-market commitment storage plus allow-list usage tracking
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommitmentLedger {
    /// market id -> commitments in id order (id = index + 1)
    commitments: HashMap<u64, Vec<Commitment>>,
    /// market id -> addresses that already used their allow-list slot
    used_addresses: HashMap<u64, HashSet<String>>,
}

impl CommitmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new unrevealed commitment, returning its sequential id.
    pub fn insert(
        &mut self,
        market_id: u64,
        owner: &str,
        commitment_hash: String,
        wager: u64,
        weight: u64,
        now: u64,
    ) -> u64 {
        let entries = self.commitments.entry(market_id).or_default();
        let id = entries.len() as u64 + 1;
        entries.push(Commitment {
            id,
            market_id,
            owner: owner.to_string(),
            commitment_hash,
            wager,
            weight,
            committed_at: now,
            revealed: false,
            claimed: false,
            position: None,
            nonce: None,
        });
        id
    }

    pub fn get(&self, market_id: u64, commitment_id: u64) -> Result<&Commitment, MarketError> {
        let not_found = MarketError::CommitmentNotFound {
            market_id,
            commitment_id,
        };
        let index = commitment_id.checked_sub(1).ok_or(not_found.clone())? as usize;
        self.commitments
            .get(&market_id)
            .and_then(|entries| entries.get(index))
            .ok_or(not_found)
    }

    fn get_mut(
        &mut self,
        market_id: u64,
        commitment_id: u64,
    ) -> Result<&mut Commitment, MarketError> {
        let not_found = MarketError::CommitmentNotFound {
            market_id,
            commitment_id,
        };
        let index = commitment_id.checked_sub(1).ok_or(not_found.clone())? as usize;
        self.commitments
            .get_mut(&market_id)
            .and_then(|entries| entries.get_mut(index))
            .ok_or(not_found)
    }

    /// All commitments of a market in id order
    pub fn for_market(&self, market_id: u64) -> &[Commitment] {
        self.commitments
            .get(&market_id)
            .map(|entries| entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn count(&self) -> usize {
        self.commitments.values().map(|entries| entries.len()).sum()
    }

    /// Whether an address already consumed its one allow-list commit
    pub fn is_used(&self, market_id: u64, address: &str) -> bool {
        self.used_addresses
            .get(&market_id)
            .map(|used| used.contains(address))
            .unwrap_or(false)
    }

    /// Consume an address's allow-list slot
    pub fn mark_used(&mut self, market_id: u64, address: &str) {
        self.used_addresses
            .entry(market_id)
            .or_default()
            .insert(address.to_string());
    }

    /// Open a commitment. Checks run in rejection-priority order: id and
    /// supplied-hash lookup, position bounds, reveal window, reveal-once,
    /// then the binding hash over the stored wager. On success the
    /// commitment is mutated and `(weight, position)` is returned for the
    /// consensus aggregate.
    pub fn reveal(
        &mut self,
        market: &Market,
        commitment_id: u64,
        supplied_hash: &str,
        position: i64,
        nonce: &str,
        now: u64,
    ) -> Result<(u64, i64), MarketError> {
        let entry = self.get_mut(market.id, commitment_id)?;

        if entry.commitment_hash != supplied_hash {
            return Err(MarketError::CommitmentNotFound {
                market_id: market.id,
                commitment_id,
            });
        }
        if !market.contains_position(position) {
            return Err(MarketError::OutOfBounds {
                position,
                lower: market.lower_bound,
                upper: market.upper_bound,
            });
        }
        if !market.in_reveal_window(now) {
            return Err(MarketError::OutsideRevealWindow);
        }
        if entry.revealed {
            return Err(MarketError::AlreadyRevealed);
        }
        if commitment_hash(position, entry.wager, nonce) != entry.commitment_hash {
            return Err(MarketError::HashMismatch);
        }

        entry.revealed = true;
        entry.position = Some(position);
        entry.nonce = Some(nonce.to_string());
        Ok((entry.weight, position))
    }

    /// Flip the claimed flag. Setting it happens before the payout
    /// transfer; clearing it is only used to undo a failed transfer.
    pub fn set_claimed(
        &mut self,
        market_id: u64,
        commitment_id: u64,
        claimed: bool,
    ) -> Result<(), MarketError> {
        let entry = self.get_mut(market_id, commitment_id)?;
        entry.claimed = claimed;
        Ok(())
    }
}
