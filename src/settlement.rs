// ============================================================================
// Settlement Engine - Crowdcast Consensus Market
// ============================================================================
//
// Computes each winning commitment's share of the prize pool against the
// frozen consensus state. Payout math floors, so a small residual may
// stay in the pool permanently.
//
// ============================================================================

use crate::commitments::Commitment;
use crate::consensus::MarketConsensus;
use crate::errors::MarketError;
use crate::math::mul_div_wide;
use crate::registry::Market;

/// Stateless payout calculator over frozen consensus state
#[derive(Debug, Clone, Default)]
pub struct SettlementEngine;

impl SettlementEngine {
    /// Validate a claim and compute its payout. Pure with respect to
    /// engine state; the caller flips the claimed flag and moves funds.
    ///
    /// Payout mode follows the market: a positive minimum wager means
    /// wager-weighted pro-rata shares; a zero minimum (sponsor-funded or
    /// allow-list voting markets) means an equal split among winners.
    pub fn compute_payout(
        &self,
        market: &Market,
        state: &MarketConsensus,
        commitment: &Commitment,
    ) -> Result<u64, MarketError> {
        if !state.resolved {
            return Err(MarketError::NotResolved);
        }
        if state.total_winnings == 0 {
            return Err(MarketError::NothingToClaim);
        }
        if !commitment.revealed {
            return Err(MarketError::NotRevealed);
        }
        if commitment.claimed {
            return Err(MarketError::AlreadyClaimed);
        }

        let distance = commitment
            .distance_from(state.consensus_position)
            .ok_or(MarketError::NotRevealed)?;
        if distance > state.winning_threshold {
            return Err(MarketError::NotWinning {
                distance,
                threshold: state.winning_threshold,
            });
        }

        if market.min_wager > 0 {
            mul_div_wide(commitment.wager, state.total_winnings, state.winning_wagers)
        } else {
            if state.winning_commitments == 0 {
                return Err(MarketError::NothingToClaim);
            }
            Ok(state.total_winnings / state.winning_commitments)
        }
    }
}
