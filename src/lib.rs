/// Crowdcast decentralized crowd-estimation market
/// Exports all modules for use as a library crate

pub mod app_state;
pub mod commitments;
pub mod config;
pub mod consensus;
pub mod engine;
pub mod errors;
pub mod events;
pub mod external;
pub mod handlers;
pub mod math;
pub mod models;
pub mod registry;
pub mod settlement;

// Re-export the engine surface
pub use commitments::{commitment_hash, decay_weight, Commitment, CommitmentLedger};
pub use config::ProtocolConfig;
pub use consensus::{ConsensusEngine, MarketConsensus, ResolutionSummary};
pub use engine::{CommitReceipt, ConsensusMarket, EngineSnapshot, EngineStats, MarketPhase};
pub use errors::MarketError;
pub use events::{Event, EventKind};
pub use external::{
    hash_identity, hash_pair, merkle_root, AccessControl, AdminList, Asset, AssetTransfer, Clock,
    ManualClock, MembershipVerifier, MerkleVerifier, SystemClock, VaultLedger,
};
pub use math::{bps_share, floor_weighted_mean, mul_div, mul_div_ceil, BPS_DENOMINATOR};
pub use registry::{Market, MarketParams, MarketRegistry, MAX_DECIMALS};
pub use settlement::SettlementEngine;
