// ============================================================================
// Protocol Configuration - Crowdcast Consensus Market
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::errors::MarketError;
use crate::math::BPS_DENOMINATOR;

/// Protocol-wide parameters. Fee rates are basis points taken from each
/// open-market wager before the remainder enters the prize pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Platform cut of every wager, in basis points
    pub platform_fee_bps: u64,
    /// Market creator cut of every wager, in basis points
    pub creator_fee_bps: u64,
    /// Community treasury cut of every wager, in basis points
    pub community_fee_bps: u64,
    /// Address receiving the platform cut and creation fees
    pub platform_treasury: String,
    /// Address receiving the community cut
    pub community_treasury: String,
    /// Flat native-currency fee charged on market creation (0 = free)
    pub creation_fee: u64,
    /// When true, only authorized addresses may create markets
    pub gated_creation: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            platform_fee_bps: 0,
            creator_fee_bps: 0,
            community_fee_bps: 0,
            platform_treasury: "treasury_platform".to_string(),
            community_treasury: "treasury_community".to_string(),
            creation_fee: 0,
            gated_creation: false,
        }
    }
}

impl ProtocolConfig {
    /// Combined fee rate across all recipients
    pub fn total_fee_bps(&self) -> u64 {
        self.platform_fee_bps + self.creator_fee_bps + self.community_fee_bps
    }

    pub fn validate(&self) -> Result<(), MarketError> {
        if self.total_fee_bps() > BPS_DENOMINATOR {
            return Err(MarketError::InvalidConfig(format!(
                "combined fee rate {} bps exceeds {}",
                self.total_fee_bps(),
                BPS_DENOMINATOR
            )));
        }
        if self.platform_treasury.is_empty() || self.community_treasury.is_empty() {
            return Err(MarketError::InvalidConfig(
                "treasury addresses must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
