// ============================================================================
// Error Types - Crowdcast Consensus Market
// ============================================================================
//
// Every engine operation either fully applies or fails with one of these
// reasons. Nothing is retried internally; the caller decides what to do
// with a rejection (e.g. resubmitting a corrected threshold).
//
// ============================================================================

use serde::Serialize;

/// Rejection reasons for market operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MarketError {
    /// Market id is out of range (ids start at 1)
    MarketNotFound(u64),
    /// Commitment id does not exist in the given market
    CommitmentNotFound { market_id: u64, commitment_id: u64 },
    /// The commit window has already closed
    CommitWindowClosed,
    /// Reveal attempted outside the reveal window
    OutsideRevealWindow,
    /// Resolution attempted before the reveal window elapsed and before
    /// every committed entry revealed
    NotReady,
    /// Wager is below the market minimum
    BelowMinimum { wager: u64, min_wager: u64 },
    /// Revealed position falls outside the market bounds
    OutOfBounds { position: i64, lower: i64, upper: i64 },
    /// Supplied hash does not match the stored commitment, or the revealed
    /// values do not reproduce it
    HashMismatch,
    /// Commitment was already revealed
    AlreadyRevealed,
    /// Market consensus was already finalized
    AlreadyResolved,
    /// Commitment was already claimed
    AlreadyClaimed,
    /// Allow-listed address has already committed in this market
    AlreadyCommitted,
    /// Merkle proof does not verify against the market allow-list root
    NotWhitelisted,
    /// No commitment revealed; consensus is undefined
    NothingRevealed,
    /// Proposed threshold sits below the target order statistic
    ThresholdTooLow,
    /// Proposed threshold sits above the target order statistic
    ThresholdTooHigh,
    /// Claim attempted before the market resolved
    NotResolved,
    /// Prize pool is empty
    NothingToClaim,
    /// Commitment was never revealed, so it cannot win
    NotRevealed,
    /// Commitment's distance from consensus exceeds the winning threshold
    NotWinning { distance: u64, threshold: u64 },
    /// Caller is not authorized for this operation
    Unauthorized,
    /// Market or protocol configuration failed validation
    InvalidConfig(String),
    /// Vault account cannot cover the requested amount
    InsufficientBalance(String),
    /// External asset movement failed; the operation was aborted
    TransferFailed(String),
    /// Arithmetic overflowed or divided by zero; never wrapped silently
    Overflow,
}

impl std::fmt::Display for MarketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketError::MarketNotFound(id) => write!(f, "Market {} not found", id),
            MarketError::CommitmentNotFound { market_id, commitment_id } => {
                write!(f, "Commitment {} not found in market {}", commitment_id, market_id)
            }
            MarketError::CommitWindowClosed => write!(f, "Commit window has closed"),
            MarketError::OutsideRevealWindow => write!(f, "Outside the reveal window"),
            MarketError::NotReady => {
                write!(f, "Reveal window still open and not all commitments revealed")
            }
            MarketError::BelowMinimum { wager, min_wager } => {
                write!(f, "Wager {} below market minimum {}", wager, min_wager)
            }
            MarketError::OutOfBounds { position, lower, upper } => {
                write!(f, "Position {} outside bounds [{}, {}]", position, lower, upper)
            }
            MarketError::HashMismatch => write!(f, "Commitment hash mismatch"),
            MarketError::AlreadyRevealed => write!(f, "Commitment already revealed"),
            MarketError::AlreadyResolved => write!(f, "Market already resolved"),
            MarketError::AlreadyClaimed => write!(f, "Commitment already claimed"),
            MarketError::AlreadyCommitted => {
                write!(f, "Address already committed in this allow-listed market")
            }
            MarketError::NotWhitelisted => write!(f, "Address not on the market allow-list"),
            MarketError::NothingRevealed => write!(f, "No commitments revealed"),
            MarketError::ThresholdTooLow => write!(f, "Proposed threshold too low"),
            MarketError::ThresholdTooHigh => write!(f, "Proposed threshold too high"),
            MarketError::NotResolved => write!(f, "Market not resolved yet"),
            MarketError::NothingToClaim => write!(f, "Prize pool is empty"),
            MarketError::NotRevealed => write!(f, "Commitment was never revealed"),
            MarketError::NotWinning { distance, threshold } => {
                write!(f, "Distance {} exceeds winning threshold {}", distance, threshold)
            }
            MarketError::Unauthorized => write!(f, "Caller not authorized"),
            MarketError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            MarketError::InsufficientBalance(msg) => write!(f, "Insufficient balance: {}", msg),
            MarketError::TransferFailed(msg) => write!(f, "Transfer failed: {}", msg),
            MarketError::Overflow => write!(f, "Arithmetic overflow"),
        }
    }
}

impl std::error::Error for MarketError {}
