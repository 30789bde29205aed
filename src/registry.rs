// ============================================================================
// Market Registry - Crowdcast Consensus Market
// ============================================================================
//
// Owns market configuration records and their identifiers. Markets are
// immutable once created; ids are sequential starting at 1, with 0
// reserved as "does not exist".
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::MarketError;
use crate::external::Asset;
use crate::math::BPS_DENOMINATOR;

/// Display-hint cap on the decimals field
pub const MAX_DECIMALS: u8 = 18;

/// Immutable market record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    /// Sequential identifier, starting at 1
    pub id: u64,

    /// Address that created the market (receives the creator fee cut)
    pub creator: String,

    /// Creation timestamp (engine clock)
    pub created_at: u64,

    /// Engine block counter at creation
    pub created_block: u64,

    /// Funding asset: native currency or a fungible token
    pub token: Asset,

    /// Inclusive lower bound for valid positions
    pub lower_bound: i64,

    /// Inclusive upper bound for valid positions
    pub upper_bound: i64,

    /// Display-only decimals hint
    pub decimals: u8,

    /// Minimum wager; 0 enables sponsor-funded equal-split markets
    pub min_wager: u64,

    /// Weight decay over the commit window, in basis points
    pub decay_factor_bps: u64,

    /// Commit window length in seconds
    pub commit_duration: u64,

    /// Reveal window length in seconds
    pub reveal_duration: u64,

    /// Share of revealed entries that win, in basis points
    pub winning_percentile_bps: u64,

    /// Opaque metadata pointer (e.g. content hash)
    pub metadata_uri: String,

    /// Optional Merkle root gating participation to a closed set
    pub allowlist_root: Option<String>,

    /// Fixed participation weight for allow-listed markets
    pub fixed_wager: u64,
}

impl Market {
    /// Last second at which commits are accepted (inclusive)
    pub fn commit_deadline(&self) -> u64 {
        self.created_at + self.commit_duration
    }

    /// Last second at which reveals are accepted (inclusive)
    pub fn reveal_deadline(&self) -> u64 {
        self.created_at + self.commit_duration + self.reveal_duration
    }

    pub fn in_commit_window(&self, now: u64) -> bool {
        now <= self.commit_deadline()
    }

    pub fn in_reveal_window(&self, now: u64) -> bool {
        now > self.commit_deadline() && now <= self.reveal_deadline()
    }

    pub fn is_allowlisted(&self) -> bool {
        self.allowlist_root.is_some()
    }

    pub fn contains_position(&self, position: i64) -> bool {
        position >= self.lower_bound && position <= self.upper_bound
    }
}

/// Parameters supplied by the creator; everything else is assigned by the
/// registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketParams {
    #[serde(default)]
    pub token: Asset,
    pub lower_bound: i64,
    pub upper_bound: i64,
    #[serde(default)]
    pub decimals: u8,
    #[serde(default)]
    pub min_wager: u64,
    #[serde(default)]
    pub decay_factor_bps: u64,
    pub commit_duration: u64,
    pub reveal_duration: u64,
    pub winning_percentile_bps: u64,
    pub metadata_uri: String,
    #[serde(default)]
    pub allowlist_root: Option<String>,
    #[serde(default)]
    pub fixed_wager: u64,
}

impl MarketParams {
    /// Full parameter validation; run before any side effect of market
    /// creation (fee collection included).
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.lower_bound >= self.upper_bound {
            return Err(MarketError::InvalidConfig(format!(
                "lower bound {} must be below upper bound {}",
                self.lower_bound, self.upper_bound
            )));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(MarketError::InvalidConfig(format!(
                "decimals {} exceeds cap {}",
                self.decimals, MAX_DECIMALS
            )));
        }
        if self.decay_factor_bps > BPS_DENOMINATOR {
            return Err(MarketError::InvalidConfig(format!(
                "decay factor {} bps out of range",
                self.decay_factor_bps
            )));
        }
        if self.commit_duration == 0 || self.reveal_duration == 0 {
            return Err(MarketError::InvalidConfig(
                "commit and reveal durations must be positive".to_string(),
            ));
        }
        if self.winning_percentile_bps > BPS_DENOMINATOR {
            return Err(MarketError::InvalidConfig(format!(
                "winning percentile {} bps out of range",
                self.winning_percentile_bps
            )));
        }
        if self.metadata_uri.is_empty() {
            return Err(MarketError::InvalidConfig(
                "metadata pointer must not be empty".to_string(),
            ));
        }
        if self.allowlist_root.is_some() && self.fixed_wager == 0 {
            return Err(MarketError::InvalidConfig(
                "allow-listed markets need a positive fixed wager".to_string(),
            ));
        }
        Ok(())
    }
}

/// Registry of all markets, keyed by id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketRegistry {
    markets: HashMap<u64, Market>,
    next_id: u64,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self {
            markets: HashMap::new(),
            next_id: 1,
        }
    }

    /// Validate parameters and store a new market, returning its id.
    pub fn create(
        &mut self,
        creator: &str,
        params: MarketParams,
        now: u64,
        block: u64,
    ) -> Result<u64, MarketError> {
        params.validate()?;

        let id = self.next_id;
        self.next_id += 1;

        let market = Market {
            id,
            creator: creator.to_string(),
            created_at: now,
            created_block: block,
            token: params.token,
            lower_bound: params.lower_bound,
            upper_bound: params.upper_bound,
            decimals: params.decimals,
            min_wager: params.min_wager,
            decay_factor_bps: params.decay_factor_bps,
            commit_duration: params.commit_duration,
            reveal_duration: params.reveal_duration,
            winning_percentile_bps: params.winning_percentile_bps,
            metadata_uri: params.metadata_uri,
            allowlist_root: params.allowlist_root,
            fixed_wager: params.fixed_wager,
        };
        self.markets.insert(id, market);
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Result<&Market, MarketError> {
        self.markets.get(&id).ok_or(MarketError::MarketNotFound(id))
    }

    pub fn contains(&self, id: u64) -> bool {
        self.markets.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.markets.len()
    }

    /// All markets in id order
    pub fn all(&self) -> Vec<&Market> {
        let mut markets: Vec<&Market> = self.markets.values().collect();
        markets.sort_by_key(|m| m.id);
        markets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_params() -> MarketParams {
        MarketParams {
            token: Asset::Native,
            lower_bound: 0,
            upper_bound: 1_000,
            decimals: 2,
            min_wager: 10,
            decay_factor_bps: 5_000,
            commit_duration: 3_600,
            reveal_duration: 3_600,
            winning_percentile_bps: 5_000,
            metadata_uri: "ipfs://question".to_string(),
            allowlist_root: None,
            fixed_wager: 0,
        }
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let mut registry = MarketRegistry::new();
        let a = registry.create("alice", valid_params(), 100, 1).unwrap();
        let b = registry.create("bob", valid_params(), 200, 2).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert!(registry.get(0).is_err());
        assert!(registry.get(3).is_err());
        assert_eq!(registry.get(1).unwrap().creator, "alice");
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let mut registry = MarketRegistry::new();
        let mut params = valid_params();
        params.lower_bound = 500;
        params.upper_bound = 500;
        assert!(registry.create("alice", params, 100, 1).is_err());
    }

    #[test]
    fn test_rejects_zero_durations() {
        let mut registry = MarketRegistry::new();
        let mut params = valid_params();
        params.commit_duration = 0;
        assert!(registry.create("alice", params, 100, 1).is_err());

        let mut params = valid_params();
        params.reveal_duration = 0;
        assert!(registry.create("alice", params, 100, 1).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_bps() {
        let mut registry = MarketRegistry::new();
        let mut params = valid_params();
        params.decay_factor_bps = 10_001;
        assert!(registry.create("alice", params, 100, 1).is_err());

        let mut params = valid_params();
        params.winning_percentile_bps = 10_001;
        assert!(registry.create("alice", params, 100, 1).is_err());
    }

    #[test]
    fn test_rejects_empty_metadata() {
        let mut registry = MarketRegistry::new();
        let mut params = valid_params();
        params.metadata_uri = String::new();
        assert!(registry.create("alice", params, 100, 1).is_err());
    }

    #[test]
    fn test_allowlist_requires_fixed_wager() {
        let mut registry = MarketRegistry::new();
        let mut params = valid_params();
        params.allowlist_root = Some("deadbeef".to_string());
        params.fixed_wager = 0;
        assert!(registry.create("alice", params, 100, 1).is_err());
    }

    #[test]
    fn test_window_boundaries() {
        let mut registry = MarketRegistry::new();
        let id = registry.create("alice", valid_params(), 1_000, 1).unwrap();
        let market = registry.get(id).unwrap();

        // Commit window is inclusive of its deadline
        assert!(market.in_commit_window(4_600));
        assert!(!market.in_commit_window(4_601));

        // Reveal window opens one second after the commit deadline
        assert!(!market.in_reveal_window(4_600));
        assert!(market.in_reveal_window(4_601));
        assert!(market.in_reveal_window(8_200));
        assert!(!market.in_reveal_window(8_201));
    }
}
