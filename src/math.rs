// ============================================================================
// Fixed-Point Arithmetic - Crowdcast Consensus Market
// ============================================================================
//
// Percentage math uses basis points (10000 = 100%). Every multiply-then-
// divide goes through a widening primitive so intermediates cannot
// overflow, and rounding is always floor. An overflow of the final result
// is a hard error, never a silent wrap.
//
// ============================================================================

use crate::errors::MarketError;

/// Basis-point denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Floor of `a * b / denom`, widened through u128 so the intermediate
/// product cannot overflow.
pub fn mul_div(a: u64, b: u64, denom: u64) -> Result<u64, MarketError> {
    if denom == 0 {
        return Err(MarketError::Overflow);
    }
    let wide = (a as u128) * (b as u128);
    u64::try_from(wide / denom as u128).map_err(|_| MarketError::Overflow)
}

/// Floor of `a * b / denom` with a wide denominator, used for pro-rata
/// payouts where the denominator is an accumulated wager sum.
pub fn mul_div_wide(a: u64, b: u64, denom: u128) -> Result<u64, MarketError> {
    if denom == 0 {
        return Err(MarketError::Overflow);
    }
    let wide = (a as u128) * (b as u128);
    u64::try_from(wide / denom).map_err(|_| MarketError::Overflow)
}

/// Ceiling of `a * b / denom`, widened through u128.
pub fn mul_div_ceil(a: u64, b: u64, denom: u64) -> Result<u64, MarketError> {
    if denom == 0 {
        return Err(MarketError::Overflow);
    }
    let wide = (a as u128) * (b as u128);
    let out = (wide + denom as u128 - 1) / denom as u128;
    u64::try_from(out).map_err(|_| MarketError::Overflow)
}

/// Basis-point share of an amount, floored.
pub fn bps_share(amount: u64, rate_bps: u64) -> Result<u64, MarketError> {
    mul_div(amount, rate_bps, BPS_DENOMINATOR)
}

/// Floor of `sum / weight` for the running weighted mean. Uses euclidean
/// division so negative sums still round toward negative infinity.
pub fn floor_weighted_mean(weighted_sum: i128, total_weight: u128) -> Result<i64, MarketError> {
    if total_weight == 0 {
        return Err(MarketError::NothingRevealed);
    }
    let divisor = i128::try_from(total_weight).map_err(|_| MarketError::Overflow)?;
    i64::try_from(weighted_sum.div_euclid(divisor)).map_err(|_| MarketError::Overflow)
}
