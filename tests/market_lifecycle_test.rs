/// Full-lifecycle integration tests with Alice, Bob and friends
///
/// Each test drives the engine through commit -> reveal -> resolve ->
/// claim against a hand-driven clock, checking balances and frozen
/// consensus state along the way.

use std::sync::Arc;

use crowdcast_consensus_market::{
    commitment_hash, hash_identity, merkle_root, AdminList, Asset, ConsensusMarket, ManualClock,
    MarketError, MarketParams, MarketPhase, ProtocolConfig,
};

// ============================================================================
// HELPERS
// ============================================================================

const ALICE: &str = "alice";
const BOB: &str = "bob";
const CAROL: &str = "carol";
const DAVE: &str = "dave";

fn engine_at(start: u64, config: ProtocolConfig) -> (ConsensusMarket, ManualClock) {
    let clock = ManualClock::new(start);
    let engine = ConsensusMarket::new(config, AdminList::default(), Arc::new(clock.clone()))
        .expect("valid config");
    (engine, clock)
}

fn fund(engine: &mut ConsensusMarket, account: &str, amount: u64) {
    engine
        .vault
        .deposit(&Asset::Native, account, amount)
        .expect("deposit");
}

fn params(min_wager: u64, winning_percentile_bps: u64) -> MarketParams {
    MarketParams {
        token: Asset::Native,
        lower_bound: 0,
        upper_bound: 100_000,
        decimals: 0,
        min_wager,
        decay_factor_bps: 0,
        commit_duration: 3_600,
        reveal_duration: 3_600,
        winning_percentile_bps,
        metadata_uri: "ipfs://how-many-beans".to_string(),
        allowlist_root: None,
        fixed_wager: 0,
    }
}

// ============================================================================
// WAGER-WEIGHTED LIFECYCLE
// ============================================================================

#[test]
fn test_full_lifecycle_with_fees_and_pro_rata_payouts() {
    let config = ProtocolConfig {
        platform_fee_bps: 100,
        creator_fee_bps: 100,
        community_fee_bps: 0,
        ..ProtocolConfig::default()
    };
    let (mut engine, clock) = engine_at(1_000, config);
    fund(&mut engine, BOB, 10_000);
    fund(&mut engine, CAROL, 10_000);
    fund(&mut engine, DAVE, 10_000);

    let id = engine.create_market(ALICE, params(100, 10_000)).unwrap();

    // Three equal wagers at positions 120, 150 and 180. Each 1_000 wager
    // loses 2% in fees, so the pool holds 3 * 980.
    let h_bob = commitment_hash(120, 1_000, "bob-nonce");
    let h_carol = commitment_hash(150, 1_000, "carol-nonce");
    let h_dave = commitment_hash(180, 1_000, "dave-nonce");
    let c_bob = engine.commit(BOB, id, h_bob.clone(), 1_000, None).unwrap();
    let c_carol = engine.commit(CAROL, id, h_carol.clone(), 1_000, None).unwrap();
    let c_dave = engine.commit(DAVE, id, h_dave.clone(), 1_000, None).unwrap();

    // Creator fee flowed straight to alice
    assert_eq!(engine.vault.balance_of(&Asset::Native, ALICE), 30);
    assert_eq!(
        engine.vault.balance_of(&Asset::Native, "treasury_platform"),
        30
    );

    // Reveal window
    clock.set(1_000 + 3_601);
    assert_eq!(engine.market_phase(id).unwrap(), MarketPhase::Reveal);
    engine.reveal(id, c_bob.commitment_id, &h_bob, 120, "bob-nonce").unwrap();
    engine.reveal(id, c_carol.commitment_id, &h_carol, 150, "carol-nonce").unwrap();
    engine.reveal(id, c_dave.commitment_id, &h_dave, 180, "dave-nonce").unwrap();

    // 100th percentile: threshold is the largest distance from the
    // weighted mean 150, which is 30, and everyone wins.
    let summary = engine.resolve(id, 30).unwrap();
    assert_eq!(summary.consensus_position, 150);
    assert_eq!(summary.winning_commitments, 3);
    assert_eq!(summary.winning_wagers, 3_000);

    // Pool 2_940 over 3_000 winning wagers: each 1_000 wager earns 980
    let payout = engine.claim(id, c_bob.commitment_id).unwrap();
    assert_eq!(payout, 980);
    assert_eq!(engine.claim(id, c_carol.commitment_id).unwrap(), 980);
    assert_eq!(engine.claim(id, c_dave.commitment_id).unwrap(), 980);
    assert_eq!(engine.vault.balance_of(&Asset::Native, BOB), 9_980);

    // Escrow fully drained, no dust in this split
    assert_eq!(engine.vault.held(&Asset::Native), 0);
}

#[test]
fn test_losers_and_double_claims_rejected() {
    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    fund(&mut engine, BOB, 10_000);
    fund(&mut engine, CAROL, 10_000);
    fund(&mut engine, DAVE, 10_000);

    // 40th percentile of 3 revealed: ceil(1.2) = 2 winners
    let id = engine.create_market(ALICE, params(100, 4_000)).unwrap();

    let h_bob = commitment_hash(100, 1_000, "nb");
    let h_carol = commitment_hash(110, 1_000, "nc");
    let h_dave = commitment_hash(400, 1_000, "nd");
    let c_bob = engine.commit(BOB, id, h_bob.clone(), 1_000, None).unwrap();
    let c_carol = engine.commit(CAROL, id, h_carol.clone(), 1_000, None).unwrap();
    let c_dave = engine.commit(DAVE, id, h_dave.clone(), 1_000, None).unwrap();

    clock.set(1_000 + 3_601);
    engine.reveal(id, c_bob.commitment_id, &h_bob, 100, "nb").unwrap();
    engine.reveal(id, c_carol.commitment_id, &h_carol, 110, "nc").unwrap();
    engine.reveal(id, c_dave.commitment_id, &h_dave, 400, "nd").unwrap();

    // Consensus floor((100 + 110 + 400) / 3) = 203; sorted distances
    // [93, 103, 197], rank 2 -> threshold 103.
    assert_eq!(engine.resolve(id, 197), Err(MarketError::ThresholdTooHigh));
    assert_eq!(engine.resolve(id, 93), Err(MarketError::ThresholdTooLow));
    let summary = engine.resolve(id, 103).unwrap();
    assert_eq!(summary.consensus_position, 203);
    assert_eq!(summary.winning_commitments, 2);

    // Dave sits at distance 197, outside the certified threshold
    assert_eq!(
        engine.claim(id, c_dave.commitment_id),
        Err(MarketError::NotWinning {
            distance: 197,
            threshold: 103
        })
    );

    // Bob claims once, then never again
    let payout = engine.claim(id, c_bob.commitment_id).unwrap();
    assert_eq!(payout, 1_500); // 1_000 of 2_000 winning wagers over a 3_000 pool
    assert_eq!(
        engine.claim(id, c_bob.commitment_id),
        Err(MarketError::AlreadyClaimed)
    );
}

#[test]
fn test_unrevealed_commitments_forfeit_to_winners() {
    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    fund(&mut engine, BOB, 10_000);
    fund(&mut engine, CAROL, 10_000);

    let id = engine.create_market(ALICE, params(100, 10_000)).unwrap();

    let h_bob = commitment_hash(500, 1_000, "nb");
    let h_carol = commitment_hash(700, 1_000, "nc");
    let c_bob = engine.commit(BOB, id, h_bob.clone(), 1_000, None).unwrap();
    let c_carol = engine.commit(CAROL, id, h_carol, 1_000, None).unwrap();

    // Only bob reveals; carol's wager stays in the pool
    clock.set(1_000 + 3_601);
    engine.reveal(id, c_bob.commitment_id, &h_bob, 500, "nb").unwrap();

    // Cannot resolve while the reveal window is open with a straggler
    assert_eq!(engine.resolve(id, 0), Err(MarketError::NotReady));

    clock.set(1_000 + 7_201);
    let summary = engine.resolve(id, 0).unwrap();
    assert_eq!(summary.consensus_position, 500);
    assert_eq!(summary.winning_commitments, 1);

    // Bob takes the whole 2_000 pool including carol's forfeited wager
    assert_eq!(engine.claim(id, c_bob.commitment_id).unwrap(), 2_000);

    // Carol never revealed, so she cannot claim
    assert_eq!(
        engine.claim(id, c_carol.commitment_id),
        Err(MarketError::NotRevealed)
    );
}

#[test]
fn test_third_party_claim_pays_the_owner() {
    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    fund(&mut engine, BOB, 5_000);

    let id = engine.create_market(ALICE, params(100, 10_000)).unwrap();
    let h = commitment_hash(42, 1_000, "n");
    let c = engine.commit(BOB, id, h.clone(), 1_000, None).unwrap();

    clock.set(1_000 + 3_601);
    engine.reveal(id, c.commitment_id, &h, 42, "n").unwrap();
    engine.resolve(id, 0).unwrap();

    // The claim call carries no caller identity at all; the payout is
    // credited to the commitment owner regardless of who triggers it.
    engine.claim(id, c.commitment_id).unwrap();
    assert_eq!(engine.vault.balance_of(&Asset::Native, BOB), 5_000);
}

// ============================================================================
// WINDOW BOUNDARIES
// ============================================================================

#[test]
fn test_commit_and_reveal_deadline_edges() {
    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    fund(&mut engine, BOB, 5_000);
    let id = engine.create_market(ALICE, params(100, 10_000)).unwrap();

    // Last second of the commit window is accepted
    clock.set(1_000 + 3_600);
    let h = commitment_hash(42, 1_000, "n");
    let c = engine.commit(BOB, id, h.clone(), 1_000, None).unwrap();

    // Reveals are not yet open at the commit deadline itself...
    assert_eq!(
        engine.reveal(id, c.commitment_id, &h, 42, "n"),
        Err(MarketError::OutsideRevealWindow)
    );

    // ...the reveal deadline itself is accepted
    clock.set(1_000 + 7_200);
    engine.reveal(id, c.commitment_id, &h, 42, "n").unwrap();

    // A second market to probe the late edge
    let id2 = engine.create_market(ALICE, params(100, 10_000)).unwrap();
    let start = engine.now();
    let h2 = commitment_hash(42, 1_000, "n2");
    let c2 = engine.commit(BOB, id2, h2.clone(), 1_000, None).unwrap();
    clock.set(start + 7_201);
    assert_eq!(
        engine.reveal(id2, c2.commitment_id, &h2, 42, "n2"),
        Err(MarketError::OutsideRevealWindow)
    );
}

#[test]
fn test_early_resolution_when_everyone_revealed() {
    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    fund(&mut engine, BOB, 5_000);
    let id = engine.create_market(ALICE, params(100, 10_000)).unwrap();

    let h = commitment_hash(42, 1_000, "n");
    let c = engine.commit(BOB, id, h.clone(), 1_000, None).unwrap();

    clock.set(1_000 + 3_601);
    engine.reveal(id, c.commitment_id, &h, 42, "n").unwrap();

    // Reveal window still has an hour left, but the reveal set is complete
    assert!(engine.resolve(id, 0).is_ok());
    assert_eq!(engine.resolve(id, 0), Err(MarketError::AlreadyResolved));
}

// ============================================================================
// DECAY WEIGHTING
// ============================================================================

#[test]
fn test_late_commits_carry_less_influence() {
    let mut p = params(100, 10_000);
    p.decay_factor_bps = 5_000;
    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    fund(&mut engine, BOB, 5_000);
    fund(&mut engine, CAROL, 5_000);

    let id = engine.create_market(ALICE, p).unwrap();

    // Bob commits immediately at full weight
    let h_bob = commitment_hash(100, 1_000, "nb");
    let c_bob = engine.commit(BOB, id, h_bob.clone(), 1_000, None).unwrap();
    assert_eq!(c_bob.weight, 1_000);

    // Carol commits at the deadline and keeps only half her wager as weight
    clock.set(1_000 + 3_600);
    let h_carol = commitment_hash(400, 1_000, "nc");
    let c_carol = engine.commit(CAROL, id, h_carol.clone(), 1_000, None).unwrap();
    assert_eq!(c_carol.weight, 500);

    clock.set(1_000 + 3_601);
    engine.reveal(id, c_bob.commitment_id, &h_bob, 100, "nb").unwrap();
    engine.reveal(id, c_carol.commitment_id, &h_carol, 400, "nc").unwrap();

    // floor((100*1000 + 400*500) / 1500) = 200: pulled toward bob
    let (_, state, _) = engine.market_view(id).unwrap();
    assert_eq!(state.running_consensus(), Some(200));
}

// ============================================================================
// BINDING HASH
// ============================================================================

#[test]
fn test_reveal_cannot_change_the_sealed_position() {
    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    fund(&mut engine, BOB, 5_000);
    let id = engine.create_market(ALICE, params(100, 10_000)).unwrap();

    let h = commitment_hash(42, 1_000, "n");
    let c = engine.commit(BOB, id, h.clone(), 1_000, None).unwrap();

    clock.set(1_000 + 3_601);
    // Different position, different nonce, wrong stored hash: all rejected
    assert_eq!(
        engine.reveal(id, c.commitment_id, &h, 43, "n"),
        Err(MarketError::HashMismatch)
    );
    assert_eq!(
        engine.reveal(id, c.commitment_id, &h, 42, "other"),
        Err(MarketError::HashMismatch)
    );
    assert!(matches!(
        engine.reveal(id, c.commitment_id, "bogus", 42, "n"),
        Err(MarketError::CommitmentNotFound { .. })
    ));
    // The honest reveal still goes through afterwards
    engine.reveal(id, c.commitment_id, &h, 42, "n").unwrap();
}

// ============================================================================
// ALLOW-LIST MARKETS
// ============================================================================

#[test]
fn test_allowlist_voting_lifecycle_with_equal_split() {
    let members: Vec<String> = [ALICE, BOB, CAROL, DAVE]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let root = merkle_root(&members);

    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    let mut p = params(0, 10_000);
    p.allowlist_root = Some(root);
    p.fixed_wager = 100;
    let id = engine.create_market("organizer", p).unwrap();

    // Sorted-pair proofs against the 4-leaf tree
    let proof_alice = vec![
        hash_identity(BOB),
        crowdcast_consensus_market::hash_pair(&hash_identity(CAROL), &hash_identity(DAVE)),
    ];
    let proof_bob = vec![
        hash_identity(ALICE),
        crowdcast_consensus_market::hash_pair(&hash_identity(CAROL), &hash_identity(DAVE)),
    ];

    let h_alice = commitment_hash(10, 100, "na");
    let h_bob = commitment_hash(20, 100, "nb");
    let c_alice = engine
        .commit(ALICE, id, h_alice.clone(), 0, Some(&proof_alice))
        .unwrap();
    let c_bob = engine
        .commit(BOB, id, h_bob.clone(), 0, Some(&proof_bob))
        .unwrap();

    // No funds moved for either commitment
    assert_eq!(engine.vault.held(&Asset::Native), 0);

    // A sponsor funds the bounty pool
    fund(&mut engine, "sponsor", 1_000);
    engine.add_winnings("sponsor", id, 1_000).unwrap();

    clock.set(1_000 + 3_601);
    engine.reveal(id, c_alice.commitment_id, &h_alice, 10, "na").unwrap();
    engine.reveal(id, c_bob.commitment_id, &h_bob, 20, "nb").unwrap();

    // Consensus 15, distances [5, 5]; both win, equal split of 1_000
    engine.resolve(id, 5).unwrap();
    assert_eq!(engine.claim(id, c_alice.commitment_id).unwrap(), 500);
    assert_eq!(engine.claim(id, c_bob.commitment_id).unwrap(), 500);
    assert_eq!(engine.vault.balance_of(&Asset::Native, ALICE), 500);
}

// ============================================================================
// SPONSORED POOLS
// ============================================================================

#[test]
fn test_winnings_can_arrive_after_resolution() {
    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    fund(&mut engine, BOB, 5_000);
    fund(&mut engine, "sponsor", 5_000);
    let id = engine.create_market(ALICE, params(100, 10_000)).unwrap();

    let h = commitment_hash(42, 1_000, "n");
    let c = engine.commit(BOB, id, h.clone(), 1_000, None).unwrap();

    clock.set(1_000 + 3_601);
    engine.reveal(id, c.commitment_id, &h, 42, "n").unwrap();
    engine.resolve(id, 0).unwrap();

    // Late sponsorship grows the already-resolved pool
    engine.add_winnings("sponsor", id, 1_000).unwrap();
    assert_eq!(engine.claim(id, c.commitment_id).unwrap(), 2_000);
}

// ============================================================================
// MARKET ISOLATION
// ============================================================================

#[test]
fn test_markets_are_independent() {
    let (mut engine, clock) = engine_at(1_000, ProtocolConfig::default());
    fund(&mut engine, BOB, 10_000);

    let a = engine.create_market(ALICE, params(100, 10_000)).unwrap();
    let b = engine.create_market(CAROL, params(100, 10_000)).unwrap();

    let h_a = commitment_hash(10, 1_000, "na");
    let h_b = commitment_hash(90, 2_000, "nb");
    let c_a = engine.commit(BOB, a, h_a.clone(), 1_000, None).unwrap();
    let c_b = engine.commit(BOB, b, h_b.clone(), 2_000, None).unwrap();
    assert_eq!(c_a.commitment_id, 1);
    assert_eq!(c_b.commitment_id, 1);

    clock.set(1_000 + 3_601);
    engine.reveal(a, c_a.commitment_id, &h_a, 10, "na").unwrap();
    engine.resolve(a, 0).unwrap();

    // Market b is untouched by a's resolution
    assert_eq!(engine.market_phase(b).unwrap(), MarketPhase::Reveal);
    engine.reveal(b, c_b.commitment_id, &h_b, 90, "nb").unwrap();
    engine.resolve(b, 0).unwrap();

    assert_eq!(engine.claim(a, c_a.commitment_id).unwrap(), 1_000);
    assert_eq!(engine.claim(b, c_b.commitment_id).unwrap(), 2_000);
}
