// API data models for the Crowdcast consensus market

use serde::{Deserialize, Serialize};

use crate::consensus::MarketConsensus;
use crate::engine::MarketPhase;
use crate::registry::{Market, MarketParams};

/// POST /markets request body
///
/// # Minimal payload:
/// ```json
/// {
///   "creator": "alice",
///   "lower_bound": 0,
///   "upper_bound": 100000,
///   "commit_duration": 3600,
///   "reveal_duration": 3600,
///   "winning_percentile_bps": 5000,
///   "metadata_uri": "ipfs://Qm..."
/// }
/// ```
///
/// Optional fields: `token`, `decimals`, `min_wager`, `decay_factor_bps`,
/// `allowlist_root` (with `fixed_wager`).
#[derive(Debug, Deserialize)]
pub struct CreateMarketRequest {
    pub creator: String,
    #[serde(flatten)]
    pub params: MarketParams,
}

/// POST /markets/:id/commit request body
#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub committer: String,
    pub commitment_hash: String,
    #[serde(default)]
    pub wager: u64,
    /// Merkle inclusion proof for allow-listed markets
    #[serde(default)]
    pub proof: Option<Vec<String>>,
}

/// POST /markets/:id/commitments/:cid/reveal request body
#[derive(Debug, Deserialize)]
pub struct RevealRequest {
    pub commitment_hash: String,
    pub position: i64,
    pub nonce: String,
}

/// POST /markets/:id/resolve request body
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub proposed_threshold: u64,
}

/// POST /markets/:id/winnings request body
#[derive(Debug, Deserialize)]
pub struct AddWinningsRequest {
    pub funder: String,
    pub amount: u64,
}

/// POST /deposit request body (test/faucet funding)
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub account: String,
    pub amount: u64,
    #[serde(default)]
    pub token: Option<String>,
}

/// POST /admin/params request body
#[derive(Debug, Deserialize)]
pub struct UpdateParamsRequest {
    pub caller: String,
    #[serde(flatten)]
    pub config: crate::config::ProtocolConfig,
}

/// Full market view: static record, live aggregate and derived phase
#[derive(Debug, Serialize)]
pub struct MarketView {
    #[serde(flatten)]
    pub market: Market,
    pub phase: MarketPhase,
    pub total_commitments: u64,
    pub revealed_commitments: u64,
    pub total_winnings: u64,
    pub resolved: bool,
    /// Weighted mean over reveals so far; null before the first reveal
    pub running_consensus: Option<i64>,
    /// Frozen resolution outcome, present once resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolutionView>,
}

#[derive(Debug, Serialize)]
pub struct ResolutionView {
    pub consensus_position: i64,
    pub winning_threshold: u64,
    pub winning_commitments: u64,
    pub winning_wagers: u128,
}

impl MarketView {
    pub fn build(market: &Market, state: &MarketConsensus, phase: MarketPhase) -> Self {
        Self {
            market: market.clone(),
            phase,
            total_commitments: state.total_commitments,
            revealed_commitments: state.revealed_commitments,
            total_winnings: state.total_winnings,
            resolved: state.resolved,
            running_consensus: state.running_consensus(),
            resolution: state.resolved.then(|| ResolutionView {
                consensus_position: state.consensus_position,
                winning_threshold: state.winning_threshold,
                winning_commitments: state.winning_commitments,
                winning_wagers: state.winning_wagers,
            }),
        }
    }
}
