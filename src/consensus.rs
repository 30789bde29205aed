// ============================================================================
// Consensus Engine - Crowdcast Consensus Market
// ============================================================================
//
// Maintains the wager-weighted running aggregate as reveals arrive and
// certifies a caller-proposed winning threshold at resolution.
//
// The resolver does NOT sort distances. A proposed threshold is accepted
// only when the strictly-below / at-or-below counts bracket the target
// rank, which holds exactly when the proposal equals the target-rank-th
// smallest distance from consensus. One O(n) scan certifies what a sort
// would compute, and any observer can supply the value. Do not replace
// the scan with a maintained sorted structure without re-deriving the
// rank invariant for incremental updates.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::commitments::Commitment;
use crate::errors::MarketError;
use crate::math::{floor_weighted_mean, mul_div_ceil, BPS_DENOMINATOR};
use crate::registry::Market;

/// Mutable per-market aggregate. Updated by every commit and reveal,
/// then frozen by the single successful resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketConsensus {
    /// Sum of all wagers received
    pub total_wagers: u128,

    /// Prize pool: net wagers plus sponsor funding
    pub total_winnings: u64,

    /// Running sum of revealed weights
    pub total_weight: u128,

    /// Running sum of position * weight over revealed entries
    pub weighted_sum: i128,

    pub resolved: bool,

    pub total_commitments: u64,
    pub revealed_commitments: u64,

    /// Certified threshold distance; meaningful once resolved
    pub winning_threshold: u64,

    /// Consensus position frozen at resolution
    pub consensus_position: i64,

    /// Summed wager of the winning set, frozen at resolution
    pub winning_wagers: u128,

    /// Number of winning commitments, frozen at resolution
    pub winning_commitments: u64,
}

impl MarketConsensus {
    /// Current weighted mean over revealed entries, if any
    pub fn running_consensus(&self) -> Option<i64> {
        floor_weighted_mean(self.weighted_sum, self.total_weight).ok()
    }

    pub fn all_revealed(&self) -> bool {
        self.total_commitments > 0 && self.revealed_commitments == self.total_commitments
    }
}

/// Outcome summary of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub consensus_position: i64,
    pub winning_threshold: u64,
    pub winning_commitments: u64,
    pub winning_wagers: u128,
    pub target_rank: u64,
}

/// Per-market consensus state, updated incrementally
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusEngine {
    state: HashMap<u64, MarketConsensus>,
}

impl ConsensusEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the zeroed aggregate for a new market
    pub fn init_market(&mut self, market_id: u64) {
        self.state.insert(market_id, MarketConsensus::default());
    }

    pub fn get(&self, market_id: u64) -> Result<&MarketConsensus, MarketError> {
        self.state
            .get(&market_id)
            .ok_or(MarketError::MarketNotFound(market_id))
    }

    fn get_mut(&mut self, market_id: u64) -> Result<&mut MarketConsensus, MarketError> {
        self.state
            .get_mut(&market_id)
            .ok_or(MarketError::MarketNotFound(market_id))
    }

    /// Iterate all per-market aggregates (stats and snapshots)
    pub fn iter(&self) -> impl Iterator<Item = (&u64, &MarketConsensus)> {
        self.state.iter()
    }

    /// Account for a new commitment: wager totals, pool contribution and
    /// the commitment count.
    pub fn record_commit(
        &mut self,
        market_id: u64,
        wager: u64,
        pool_contribution: u64,
    ) -> Result<(), MarketError> {
        let state = self.get_mut(market_id)?;
        state.total_wagers = state
            .total_wagers
            .checked_add(wager as u128)
            .ok_or(MarketError::Overflow)?;
        state.total_winnings = state
            .total_winnings
            .checked_add(pool_contribution)
            .ok_or(MarketError::Overflow)?;
        state.total_commitments += 1;
        Ok(())
    }

    /// Fold a reveal into the running aggregate: O(1) amortized, no
    /// recomputation over history.
    pub fn record_reveal(
        &mut self,
        market_id: u64,
        weight: u64,
        position: i64,
    ) -> Result<(), MarketError> {
        let state = self.get_mut(market_id)?;
        state.total_weight = state
            .total_weight
            .checked_add(weight as u128)
            .ok_or(MarketError::Overflow)?;
        state.weighted_sum = state
            .weighted_sum
            .checked_add(position as i128 * weight as i128)
            .ok_or(MarketError::Overflow)?;
        state.revealed_commitments += 1;
        Ok(())
    }

    /// Grow the prize pool from sponsor funding, pre- or post-resolution.
    pub fn add_winnings(&mut self, market_id: u64, amount: u64) -> Result<u64, MarketError> {
        let state = self.get_mut(market_id)?;
        state.total_winnings = state
            .total_winnings
            .checked_add(amount)
            .ok_or(MarketError::Overflow)?;
        Ok(state.total_winnings)
    }

    /// Certify `proposed_threshold` as the target-rank order statistic of
    /// revealed distances and freeze the market. Irreversible; succeeds
    /// at most once per market.
    pub fn resolve(
        &mut self,
        market: &Market,
        commitments: &[Commitment],
        now: u64,
        proposed_threshold: u64,
    ) -> Result<ResolutionSummary, MarketError> {
        let state = self.get_mut(market.id)?;

        if state.resolved {
            return Err(MarketError::AlreadyResolved);
        }
        let window_elapsed = now > market.reveal_deadline();
        if !window_elapsed && !state.all_revealed() {
            return Err(MarketError::NotReady);
        }
        if state.revealed_commitments == 0 {
            return Err(MarketError::NothingRevealed);
        }

        let consensus_position = floor_weighted_mean(state.weighted_sum, state.total_weight)?;

        let target_rank = mul_div_ceil(
            market.winning_percentile_bps,
            state.revealed_commitments,
            BPS_DENOMINATOR,
        )?;
        let target_rank = if market.winning_percentile_bps > 0 && state.revealed_commitments > 0 {
            target_rank.max(1)
        } else {
            target_rank
        };

        // Single pass over every commitment; unrevealed entries never
        // influence the outcome.
        let mut strictly_below: u64 = 0;
        let mut at_or_below: u64 = 0;
        let mut winning_wagers: u128 = 0;
        for commitment in commitments {
            let distance = match commitment.distance_from(consensus_position) {
                Some(d) => d,
                None => continue,
            };
            if distance < proposed_threshold {
                strictly_below += 1;
            }
            if distance <= proposed_threshold {
                at_or_below += 1;
                winning_wagers = winning_wagers
                    .checked_add(commitment.wager as u128)
                    .ok_or(MarketError::Overflow)?;
            }
        }

        // Rank invariant: strictly_below < target_rank <= at_or_below
        // holds exactly when the proposal is the target-rank-th smallest
        // revealed distance.
        if strictly_below >= target_rank {
            return Err(MarketError::ThresholdTooHigh);
        }
        if at_or_below < target_rank {
            return Err(MarketError::ThresholdTooLow);
        }

        state.winning_threshold = proposed_threshold;
        state.consensus_position = consensus_position;
        state.winning_wagers = winning_wagers;
        state.winning_commitments = at_or_below;
        state.resolved = true;

        Ok(ResolutionSummary {
            consensus_position,
            winning_threshold: proposed_threshold,
            winning_commitments: at_or_below,
            winning_wagers,
            target_rank,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::Asset;

    fn test_market(winning_percentile_bps: u64) -> Market {
        Market {
            id: 1,
            creator: "alice".to_string(),
            created_at: 0,
            created_block: 1,
            token: Asset::Native,
            lower_bound: 0,
            upper_bound: 1_000,
            decimals: 0,
            min_wager: 1,
            decay_factor_bps: 0,
            commit_duration: 100,
            reveal_duration: 100,
            winning_percentile_bps,
            metadata_uri: "ipfs://question".to_string(),
            allowlist_root: None,
            fixed_wager: 0,
        }
    }

    fn revealed(id: u64, position: i64, wager: u64, weight: u64) -> Commitment {
        Commitment {
            id,
            market_id: 1,
            owner: format!("addr_{}", id),
            commitment_hash: String::new(),
            wager,
            weight,
            committed_at: 0,
            revealed: true,
            claimed: false,
            position: Some(position),
            nonce: Some("n".to_string()),
        }
    }

    fn unrevealed(id: u64, wager: u64, weight: u64) -> Commitment {
        Commitment {
            revealed: false,
            position: None,
            nonce: None,
            ..revealed(id, 0, wager, weight)
        }
    }

    /// Engine with `reveals` already folded in and commit counts set
    fn engine_with(commitments: &[Commitment]) -> ConsensusEngine {
        let mut engine = ConsensusEngine::new();
        engine.init_market(1);
        for c in commitments {
            engine.record_commit(1, c.wager, c.wager).unwrap();
        }
        for c in commitments.iter().filter(|c| c.revealed) {
            engine
                .record_reveal(1, c.weight, c.position.unwrap())
                .unwrap();
        }
        engine
    }

    #[test]
    fn test_running_consensus_equal_weights() {
        // Scenario A: positions 120/150/180, equal unit wagers, no decay
        let commitments = vec![
            revealed(1, 120, 1, 1),
            revealed(2, 150, 1, 1),
            revealed(3, 180, 1, 1),
        ];
        let engine = engine_with(&commitments);
        assert_eq!(engine.get(1).unwrap().running_consensus(), Some(150));
    }

    #[test]
    fn test_unrevealed_never_influence_consensus() {
        let commitments = vec![
            revealed(1, 100, 5, 5),
            revealed(2, 200, 5, 5),
            unrevealed(3, 1_000, 1_000),
        ];
        let engine = engine_with(&commitments);
        assert_eq!(engine.get(1).unwrap().running_consensus(), Some(150));
    }

    #[test]
    fn test_weighted_consensus_floors() {
        let commitments = vec![revealed(1, 100, 2, 2), revealed(2, 101, 1, 1)];
        let engine = engine_with(&commitments);
        // (200 + 101) / 3 = 100.33 -> 100
        assert_eq!(engine.get(1).unwrap().running_consensus(), Some(100));
    }

    #[test]
    fn test_resolve_certifies_exact_order_statistic() {
        // Distances from consensus 150: [30, 0, 30]
        let commitments = vec![
            revealed(1, 120, 1, 1),
            revealed(2, 150, 1, 1),
            revealed(3, 180, 1, 1),
        ];
        let market = test_market(10_000); // rank = 3 -> threshold 30

        let mut engine = engine_with(&commitments);
        assert_eq!(
            engine.resolve(&market, &commitments, 201, 29),
            Err(MarketError::ThresholdTooLow)
        );
        let mut engine = engine_with(&commitments);
        assert_eq!(
            engine.resolve(&market, &commitments, 201, 31),
            Err(MarketError::ThresholdTooHigh)
        );

        let mut engine = engine_with(&commitments);
        let summary = engine.resolve(&market, &commitments, 201, 30).unwrap();
        assert_eq!(summary.consensus_position, 150);
        assert_eq!(summary.winning_commitments, 3);
        assert_eq!(summary.target_rank, 3);
    }

    #[test]
    fn test_resolve_every_rank_accepts_only_true_statistic() {
        // Consensus floor((120+150+180+300)/4) = 187; distances
        // [67, 37, 7, 113] sorted [7, 37, 67, 113]
        let commitments = vec![
            revealed(1, 120, 1, 1),
            revealed(2, 150, 1, 1),
            revealed(3, 180, 1, 1),
            revealed(4, 300, 1, 1),
        ];
        let sorted_distances = [7u64, 37, 67, 113];

        for rank in 1..=4u64 {
            // Percentile that lands exactly on this rank: rank/4 in bps
            let market = test_market(rank * 2_500);
            let statistic = sorted_distances[(rank - 1) as usize];

            for proposal in [0u64, 6, 7, 8, 36, 37, 38, 66, 67, 68, 112, 113, 114] {
                let mut engine = engine_with(&commitments);
                let result = engine.resolve(&market, &commitments, 201, proposal);
                if proposal == statistic {
                    assert!(result.is_ok(), "rank {} proposal {}", rank, proposal);
                } else {
                    assert!(result.is_err(), "rank {} proposal {}", rank, proposal);
                }
            }
        }
    }

    #[test]
    fn test_resolve_requires_window_or_full_reveal() {
        let commitments = vec![revealed(1, 150, 1, 1), unrevealed(2, 1, 1)];
        let mut engine = engine_with(&commitments);
        let market = test_market(10_000);

        // Reveal window still open, one commitment outstanding
        assert_eq!(
            engine.resolve(&market, &commitments, 150, 0),
            Err(MarketError::NotReady)
        );
        // Window elapsed: resolvable even with the unrevealed straggler
        assert!(engine.resolve(&market, &commitments, 201, 0).is_ok());
    }

    #[test]
    fn test_resolve_early_when_all_revealed() {
        let commitments = vec![revealed(1, 150, 1, 1), revealed(2, 150, 1, 1)];
        let mut engine = engine_with(&commitments);
        let market = test_market(10_000);

        // Inside the reveal window but everyone revealed
        assert!(engine.resolve(&market, &commitments, 150, 0).is_ok());
    }

    #[test]
    fn test_resolve_rejects_empty_reveal_set() {
        let commitments = vec![unrevealed(1, 1, 1)];
        let mut engine = engine_with(&commitments);
        let market = test_market(10_000);
        assert_eq!(
            engine.resolve(&market, &commitments, 500, 0),
            Err(MarketError::NothingRevealed)
        );
    }

    #[test]
    fn test_resolve_only_once() {
        let commitments = vec![revealed(1, 150, 1, 1)];
        let mut engine = engine_with(&commitments);
        let market = test_market(10_000);

        engine.resolve(&market, &commitments, 201, 0).unwrap();
        assert_eq!(
            engine.resolve(&market, &commitments, 201, 0),
            Err(MarketError::AlreadyResolved)
        );
    }

    #[test]
    fn test_resolve_freezes_winning_set() {
        // Consensus 2 with distances [1, 1, 1, 1] (Scenario B positions)
        let commitments = vec![
            revealed(1, 1, 10, 10),
            revealed(2, 1, 10, 10),
            revealed(3, 3, 10, 10),
            revealed(4, 3, 10, 10),
        ];
        let mut engine = engine_with(&commitments);
        let market = test_market(10_000);

        let summary = engine.resolve(&market, &commitments, 201, 1).unwrap();
        assert_eq!(summary.consensus_position, 2);
        assert_eq!(summary.winning_commitments, 4);
        assert_eq!(summary.winning_wagers, 40);

        let state = engine.get(1).unwrap();
        assert!(state.resolved);
        assert_eq!(state.winning_threshold, 1);
        assert_eq!(state.consensus_position, 2);
    }

    #[test]
    fn test_half_percentile_rank() {
        // 5000 bps of 3 revealed = ceil(1.5) = 2 -> threshold is the
        // 2nd smallest distance
        let commitments = vec![
            revealed(1, 120, 1, 1),
            revealed(2, 150, 1, 1),
            revealed(3, 180, 1, 1),
        ];
        let market = test_market(5_000);

        let mut engine = engine_with(&commitments);
        let summary = engine.resolve(&market, &commitments, 201, 30).unwrap();
        assert_eq!(summary.target_rank, 2);
        // 30 admits all three at-or-below; rank 2 <= 3 and only one
        // strictly below, so 30 is certified with 3 winners
        assert_eq!(summary.winning_commitments, 3);
    }
}
