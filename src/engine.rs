// ============================================================================
// Consensus Market Engine - Crowdcast Consensus Market
// ============================================================================
//
// Facade wiring the registry, commitment ledger, consensus engine and
// settlement engine together with the external collaborators (vault,
// allow-list verifier, access control, clock). Every public method is one
// atomic operation: all checks run first, then asset movement, then state
// mutation, so a rejected or failed operation leaves no partial state.
//
// Operations on different markets are fully independent; within one
// engine the exclusive borrow is the only writer, so no locking happens
// here (the HTTP layer serializes access with a mutex).
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::commitments::{decay_weight, Commitment, CommitmentLedger};
use crate::config::ProtocolConfig;
use crate::consensus::{ConsensusEngine, MarketConsensus, ResolutionSummary};
use crate::errors::MarketError;
use crate::events::{Event, EventKind};
use crate::external::{
    AccessControl, AdminList, Asset, AssetTransfer, Clock, MembershipVerifier, MerkleVerifier,
    SystemClock, VaultLedger,
};
use crate::math::bps_share;
use crate::registry::{Market, MarketParams, MarketRegistry};
use crate::settlement::SettlementEngine;

/// Bound on the in-memory activity log
const ACTIVITY_LOG_CAP: usize = 1_000;

/// Derived lifecycle phase, for API consumers. The engine itself keys
/// every check off timestamps, never off a stored phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPhase {
    Commit,
    Reveal,
    AwaitingResolution,
    Resolved,
}

/// Receipt returned to a committer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    pub commitment_id: u64,
    pub wager: u64,
    pub weight: u64,
}

/// Cross-market totals
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub markets: usize,
    pub commitments: usize,
    pub resolved_markets: usize,
    pub total_pool: u128,
    pub total_wagered: u128,
    pub block: u64,
    pub events: usize,
}

/// Serializable engine state for disk snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub registry: MarketRegistry,
    pub commitments: CommitmentLedger,
    pub consensus: ConsensusEngine,
    pub config: ProtocolConfig,
    pub vault: VaultLedger,
    pub access: AdminList,
    pub events: Vec<Event>,
    pub block: u64,
}

pub struct ConsensusMarket {
    pub registry: MarketRegistry,
    pub commitments: CommitmentLedger,
    pub consensus: ConsensusEngine,
    pub settlement: SettlementEngine,
    pub config: ProtocolConfig,
    pub vault: VaultLedger,
    pub verifier: MerkleVerifier,
    pub access: AdminList,
    clock: Arc<dyn Clock>,
    events: Vec<Event>,
    activity: Vec<String>,
    block: u64,
}

impl ConsensusMarket {
    pub fn new(
        config: ProtocolConfig,
        access: AdminList,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MarketError> {
        config.validate()?;
        Ok(Self {
            registry: MarketRegistry::new(),
            commitments: CommitmentLedger::new(),
            consensus: ConsensusEngine::new(),
            settlement: SettlementEngine,
            config,
            vault: VaultLedger::new(),
            verifier: MerkleVerifier,
            access,
            clock,
            events: Vec::new(),
            activity: Vec::new(),
            block: 0,
        })
    }

    /// Engine with default config on the system clock
    pub fn with_system_clock() -> Self {
        // Default config always validates
        Self::new(
            ProtocolConfig::default(),
            AdminList::default(),
            Arc::new(SystemClock),
        )
        .unwrap_or_else(|_| unreachable!("default config is valid"))
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    // ========================================================================
    // MARKET CREATION
    // ========================================================================

    /// Create a market. Optionally gated by the access collaborator and
    /// charged a flat creation fee remitted to the platform treasury.
    pub fn create_market(
        &mut self,
        caller: &str,
        params: MarketParams,
    ) -> Result<u64, MarketError> {
        if self.config.gated_creation && !self.access.is_authorized(caller) {
            return Err(MarketError::Unauthorized);
        }
        // Validate before the fee moves so a bad config cannot cost money
        params.validate()?;

        if self.config.creation_fee > 0 {
            let treasury = self.config.platform_treasury.clone();
            self.vault
                .transfer_in(&Asset::Native, caller, self.config.creation_fee)?;
            self.vault
                .transfer_out(&Asset::Native, &treasury, self.config.creation_fee)?;
        }

        self.block += 1;
        let now = self.clock.now();
        let metadata_uri = params.metadata_uri.clone();
        let id = self.registry.create(caller, params, now, self.block)?;
        self.consensus.init_market(id);

        self.push_event(EventKind::MarketCreated {
            market_id: id,
            creator: caller.to_string(),
            metadata_uri,
        });
        self.log_activity(format!("📊 market {} created by {}", id, caller));
        info!(market_id = id, creator = caller, "market created");
        Ok(id)
    }

    // ========================================================================
    // COMMIT
    // ========================================================================

    /// Place a sealed commitment. Open markets move the wager through the
    /// vault and split fees; allow-listed markets move nothing and force
    /// the market's fixed participation weight.
    pub fn commit(
        &mut self,
        caller: &str,
        market_id: u64,
        commitment_hash: String,
        wager: u64,
        proof: Option<&[String]>,
    ) -> Result<CommitReceipt, MarketError> {
        let now = self.clock.now();
        let market = self.registry.get(market_id)?.clone();

        if !market.in_commit_window(now) {
            return Err(MarketError::CommitWindowClosed);
        }

        let (effective_wager, pool_contribution) = if let Some(root) = &market.allowlist_root {
            if self.commitments.is_used(market_id, caller) {
                return Err(MarketError::AlreadyCommitted);
            }
            let proof = proof.unwrap_or(&[]);
            if !self.verifier.verify(root, proof, caller) {
                return Err(MarketError::NotWhitelisted);
            }
            self.commitments.mark_used(market_id, caller);
            // One address, one vote: the supplied wager is discarded in
            // favor of the market's fixed weight, so the minimum-wager
            // check does not apply here and no pool contribution is made
            (market.fixed_wager, 0)
        } else {
            if wager < market.min_wager {
                return Err(MarketError::BelowMinimum {
                    wager,
                    min_wager: market.min_wager,
                });
            }
            let platform_fee = bps_share(wager, self.config.platform_fee_bps)?;
            let creator_fee = bps_share(wager, self.config.creator_fee_bps)?;
            let community_fee = bps_share(wager, self.config.community_fee_bps)?;
            let total_fees = platform_fee
                .checked_add(creator_fee)
                .and_then(|sum| sum.checked_add(community_fee))
                .ok_or(MarketError::Overflow)?;
            let pool = wager.checked_sub(total_fees).ok_or(MarketError::Overflow)?;

            let platform_treasury = self.config.platform_treasury.clone();
            let community_treasury = self.config.community_treasury.clone();
            self.vault.transfer_in(&market.token, caller, wager)?;
            self.vault
                .transfer_out(&market.token, &platform_treasury, platform_fee)?;
            self.vault
                .transfer_out(&market.token, &market.creator, creator_fee)?;
            self.vault
                .transfer_out(&market.token, &community_treasury, community_fee)?;
            (wager, pool)
        };

        let elapsed = now.saturating_sub(market.created_at);
        let weight = decay_weight(
            effective_wager,
            market.decay_factor_bps,
            elapsed,
            market.commit_duration,
        )?;

        let commitment_id = self.commitments.insert(
            market_id,
            caller,
            commitment_hash.clone(),
            effective_wager,
            weight,
            now,
        );
        self.consensus
            .record_commit(market_id, effective_wager, pool_contribution)?;
        self.block += 1;

        self.push_event(EventKind::CommitmentCreated {
            market_id,
            commitment_id,
            owner: caller.to_string(),
            commitment_hash,
            wager: effective_wager,
            weight,
        });
        self.log_activity(format!(
            "🎯 commitment {} sealed in market {} (wager {}, weight {})",
            commitment_id, market_id, effective_wager, weight
        ));
        info!(
            market_id,
            commitment_id,
            wager = effective_wager,
            weight,
            "commitment created"
        );
        Ok(CommitReceipt {
            commitment_id,
            wager: effective_wager,
            weight,
        })
    }

    // ========================================================================
    // REVEAL
    // ========================================================================

    /// Open a commitment and fold it into the running consensus.
    pub fn reveal(
        &mut self,
        market_id: u64,
        commitment_id: u64,
        commitment_hash: &str,
        position: i64,
        nonce: &str,
    ) -> Result<(), MarketError> {
        let now = self.clock.now();
        let market = self.registry.get(market_id)?.clone();

        let (weight, position) = self.commitments.reveal(
            &market,
            commitment_id,
            commitment_hash,
            position,
            nonce,
            now,
        )?;
        self.consensus.record_reveal(market_id, weight, position)?;
        self.block += 1;

        self.push_event(EventKind::CommitmentRevealed {
            market_id,
            commitment_id,
            position,
            weight,
        });
        self.log_activity(format!(
            "🔓 commitment {} revealed position {} in market {}",
            commitment_id, position, market_id
        ));
        info!(market_id, commitment_id, position, "commitment revealed");
        Ok(())
    }

    // ========================================================================
    // RESOLVE
    // ========================================================================

    /// Permissionless resolution: any caller may propose the threshold,
    /// but only the true order statistic is certified.
    pub fn resolve(
        &mut self,
        market_id: u64,
        proposed_threshold: u64,
    ) -> Result<ResolutionSummary, MarketError> {
        let now = self.clock.now();
        let market = self.registry.get(market_id)?.clone();

        let summary = self.consensus.resolve(
            &market,
            self.commitments.for_market(market_id),
            now,
            proposed_threshold,
        )?;
        self.block += 1;

        self.push_event(EventKind::MarketResolved {
            market_id,
            winning_threshold: summary.winning_threshold,
            consensus_position: summary.consensus_position,
            winning_commitments: summary.winning_commitments,
        });
        self.log_activity(format!(
            "✅ market {} resolved at consensus {} (threshold {}, {} winners)",
            market_id,
            summary.consensus_position,
            summary.winning_threshold,
            summary.winning_commitments
        ));
        info!(
            market_id,
            consensus_position = summary.consensus_position,
            winning_threshold = summary.winning_threshold,
            "market resolved"
        );
        Ok(summary)
    }

    // ========================================================================
    // SETTLEMENT
    // ========================================================================

    /// Pay out a winning commitment. Anyone may trigger the claim; funds
    /// always go to the commitment owner. Each commitment pays at most
    /// once.
    pub fn claim(&mut self, market_id: u64, commitment_id: u64) -> Result<u64, MarketError> {
        let market = self.registry.get(market_id)?.clone();
        let state = self.consensus.get(market_id)?.clone();
        let commitment = self.commitments.get(market_id, commitment_id)?.clone();

        let payout = self
            .settlement
            .compute_payout(&market, &state, &commitment)?;

        // Effects before interaction: flag first, then move funds. The
        // vault cannot call back into the engine while we hold the
        // exclusive borrow; a failed transfer rolls the flag back so the
        // winnings stay claimable.
        self.commitments.set_claimed(market_id, commitment_id, true)?;
        if let Err(err) = self
            .vault
            .transfer_out(&market.token, &commitment.owner, payout)
        {
            self.commitments
                .set_claimed(market_id, commitment_id, false)?;
            return Err(err);
        }
        self.block += 1;

        self.push_event(EventKind::WinningsClaimed {
            market_id,
            commitment_id,
            owner: commitment.owner.clone(),
            payout,
        });
        self.log_activity(format!(
            "🏆 commitment {} claimed {} from market {}",
            commitment_id, payout, market_id
        ));
        info!(market_id, commitment_id, payout, "winnings claimed");
        Ok(payout)
    }

    /// Sponsor the prize pool independently of wagers, before or after
    /// resolution. Enables bounty markets with a zero minimum wager.
    pub fn add_winnings(
        &mut self,
        caller: &str,
        market_id: u64,
        amount: u64,
    ) -> Result<u64, MarketError> {
        if amount == 0 {
            return Err(MarketError::InvalidConfig(
                "winnings amount must be positive".to_string(),
            ));
        }
        let market = self.registry.get(market_id)?.clone();
        // Pre-check the pool accumulator so the transfer never needs undoing
        self.consensus
            .get(market_id)?
            .total_winnings
            .checked_add(amount)
            .ok_or(MarketError::Overflow)?;

        self.vault.transfer_in(&market.token, caller, amount)?;
        let total = self.consensus.add_winnings(market_id, amount)?;
        self.block += 1;

        self.push_event(EventKind::WinningsAdded {
            market_id,
            funder: caller.to_string(),
            amount,
        });
        self.log_activity(format!(
            "💰 {} added {} to market {} pool (now {})",
            caller, amount, market_id, total
        ));
        info!(market_id, funder = caller, amount, "winnings added");
        Ok(total)
    }

    // ========================================================================
    // ADMINISTRATION
    // ========================================================================

    /// Replace the protocol parameters; authorized callers only.
    pub fn update_params(
        &mut self,
        caller: &str,
        new_config: ProtocolConfig,
    ) -> Result<(), MarketError> {
        if !self.access.is_authorized(caller) {
            return Err(MarketError::Unauthorized);
        }
        new_config.validate()?;
        self.config = new_config;
        self.log_activity(format!("⚙️ protocol parameters updated by {}", caller));
        info!(caller, "protocol parameters updated");
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn market_phase(&self, market_id: u64) -> Result<MarketPhase, MarketError> {
        let market = self.registry.get(market_id)?;
        let state = self.consensus.get(market_id)?;
        let now = self.clock.now();

        Ok(if state.resolved {
            MarketPhase::Resolved
        } else if market.in_commit_window(now) {
            MarketPhase::Commit
        } else if market.in_reveal_window(now) && !state.all_revealed() {
            MarketPhase::Reveal
        } else {
            MarketPhase::AwaitingResolution
        })
    }

    pub fn market_view(
        &self,
        market_id: u64,
    ) -> Result<(&Market, &MarketConsensus, MarketPhase), MarketError> {
        let phase = self.market_phase(market_id)?;
        Ok((
            self.registry.get(market_id)?,
            self.consensus.get(market_id)?,
            phase,
        ))
    }

    /// Commitments owned by an address, across all of a market
    pub fn commitments_for_owner(&self, market_id: u64, owner: &str) -> Vec<&Commitment> {
        self.commitments
            .for_market(market_id)
            .iter()
            .filter(|c| c.owner == owner)
            .collect()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn activity(&self) -> &[String] {
        &self.activity
    }

    pub fn stats(&self) -> EngineStats {
        let mut resolved_markets = 0;
        let mut total_pool: u128 = 0;
        let mut total_wagered: u128 = 0;
        for (_, state) in self.consensus.iter() {
            if state.resolved {
                resolved_markets += 1;
            }
            total_pool += state.total_winnings as u128;
            total_wagered += state.total_wagers;
        }
        EngineStats {
            markets: self.registry.count(),
            commitments: self.commitments.count(),
            resolved_markets,
            total_pool,
            total_wagered,
            block: self.block,
            events: self.events.len(),
        }
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            registry: self.registry.clone(),
            commitments: self.commitments.clone(),
            consensus: self.consensus.clone(),
            config: self.config.clone(),
            vault: self.vault.clone(),
            access: self.access.clone(),
            events: self.events.clone(),
            block: self.block,
        }
    }

    pub fn restore(&mut self, snapshot: EngineSnapshot) {
        self.registry = snapshot.registry;
        self.commitments = snapshot.commitments;
        self.consensus = snapshot.consensus;
        self.config = snapshot.config;
        self.vault = snapshot.vault;
        self.access = snapshot.access;
        self.events = snapshot.events;
        self.block = snapshot.block;
    }

    // ========================================================================
    // INTERNAL
    // ========================================================================

    fn push_event(&mut self, kind: EventKind) {
        let event = Event::new(self.clock.now(), kind);
        self.events.push(event);
    }

    fn log_activity(&mut self, entry: String) {
        self.activity.push(format!("[{}] {}", self.clock.now(), entry));
        if self.activity.len() > ACTIVITY_LOG_CAP {
            self.activity.remove(0);
        }
    }
}
