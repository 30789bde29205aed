// ============================================================================
// External Collaborators - Crowdcast Consensus Market
// ============================================================================
//
// The engine core never moves assets, checks allow-list membership,
// authorizes admins, or reads wall-clock time directly. Each of those
// concerns sits behind a trait, with the in-process implementations below
// wired in by default. Swapping in a different custody or identity layer
// means implementing the trait, not touching the engine.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::MarketError;

// ============================================================================
// ASSETS
// ============================================================================

/// Funding asset for a market: the native currency or a fungible token
/// identified by its address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Asset {
    Native,
    Token(String),
}

impl Default for Asset {
    fn default() -> Self {
        Asset::Native
    }
}

impl Asset {
    /// Stable key for ledger maps
    pub fn key(&self) -> String {
        match self {
            Asset::Native => "native".to_string(),
            Asset::Token(addr) => format!("token:{}", addr),
        }
    }
}

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// Asset custody seam. A failed transfer aborts the operation that
/// requested it; the engine commits no partial state on failure.
pub trait AssetTransfer {
    /// Pull `amount` of `asset` from `from` into engine custody.
    fn transfer_in(&mut self, asset: &Asset, from: &str, amount: u64) -> Result<(), MarketError>;
    /// Push `amount` of `asset` from engine custody out to `to`.
    fn transfer_out(&mut self, asset: &Asset, to: &str, amount: u64) -> Result<(), MarketError>;
}

/// Allow-list membership seam (Merkle-style inclusion check).
pub trait MembershipVerifier {
    fn verify(&self, root: &str, proof: &[String], identity: &str) -> bool;
}

/// Capability check for administrative operations and, optionally,
/// market creation.
pub trait AccessControl {
    fn is_authorized(&self, caller: &str) -> bool;
}

/// Monotonically non-decreasing clock. Phase transitions are pure
/// timestamp comparisons against this, never scheduled callbacks.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

// ============================================================================
// CLOCKS
// ============================================================================

/// Wall-clock seconds since the Unix epoch
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Hand-driven clock for tests; cloning shares the underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// VAULT LEDGER
// ============================================================================

/// In-process custody ledger. Tracks per-asset account balances plus the
/// amount the engine currently holds in escrow for each asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultLedger {
    /// asset key -> address -> balance
    balances: HashMap<String, HashMap<String, u64>>,
    /// asset key -> amount held in engine custody
    held: HashMap<String, u64>,
}

impl VaultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account directly (deposits / test funding).
    pub fn deposit(&mut self, asset: &Asset, to: &str, amount: u64) -> Result<u64, MarketError> {
        let entry = self
            .balances
            .entry(asset.key())
            .or_default()
            .entry(to.to_string())
            .or_insert(0);
        *entry = entry.checked_add(amount).ok_or(MarketError::Overflow)?;
        Ok(*entry)
    }

    pub fn balance_of(&self, asset: &Asset, who: &str) -> u64 {
        self.balances
            .get(&asset.key())
            .and_then(|accounts| accounts.get(who))
            .copied()
            .unwrap_or(0)
    }

    /// Amount currently escrowed by the engine for an asset.
    pub fn held(&self, asset: &Asset) -> u64 {
        self.held.get(&asset.key()).copied().unwrap_or(0)
    }

    pub fn accounts(&self, asset: &Asset) -> usize {
        self.balances
            .get(&asset.key())
            .map(|accounts| accounts.len())
            .unwrap_or(0)
    }
}

impl AssetTransfer for VaultLedger {
    fn transfer_in(&mut self, asset: &Asset, from: &str, amount: u64) -> Result<(), MarketError> {
        if amount == 0 {
            return Ok(());
        }
        // Validate both sides before mutating either; a failed transfer
        // must leave the vault untouched
        let balance = self.balance_of(asset, from);
        if balance < amount {
            return Err(MarketError::InsufficientBalance(format!(
                "{} holds {} of {}, needs {}",
                from,
                balance,
                asset.key(),
                amount
            )));
        }
        let new_held = self
            .held(asset)
            .checked_add(amount)
            .ok_or(MarketError::Overflow)?;
        self.balances
            .entry(asset.key())
            .or_default()
            .insert(from.to_string(), balance - amount);
        self.held.insert(asset.key(), new_held);
        Ok(())
    }

    fn transfer_out(&mut self, asset: &Asset, to: &str, amount: u64) -> Result<(), MarketError> {
        if amount == 0 {
            return Ok(());
        }
        let held = self.held.entry(asset.key()).or_insert(0);
        if *held < amount {
            return Err(MarketError::TransferFailed(format!(
                "engine custody holds {} of {}, cannot pay {}",
                held, asset.key(), amount
            )));
        }
        *held -= amount;
        let entry = self
            .balances
            .entry(asset.key())
            .or_default()
            .entry(to.to_string())
            .or_insert(0);
        *entry = entry.checked_add(amount).ok_or(MarketError::Overflow)?;
        Ok(())
    }
}

// ============================================================================
// MERKLE ALLOW-LIST
// ============================================================================

/// Leaf hash for an allow-list identity
pub fn hash_identity(identity: &str) -> String {
    hex::encode(Sha256::digest(identity.as_bytes()))
}

/// Sorted-pair parent hash, so proofs carry no left/right flags
pub fn hash_pair(a: &str, b: &str) -> String {
    let mut hasher = Sha256::new();
    if a <= b {
        hasher.update(a.as_bytes());
        hasher.update(b.as_bytes());
    } else {
        hasher.update(b.as_bytes());
        hasher.update(a.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Root of a sorted-pair Merkle tree over identity leaves. Odd nodes are
/// promoted unpaired. Used by market creators and by tests to derive the
/// root the verifier checks against.
pub fn merkle_root(identities: &[String]) -> String {
    let mut level: Vec<String> = identities.iter().map(|id| hash_identity(id)).collect();
    if level.is_empty() {
        return String::new();
    }
    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            match pair {
                [a, b] => next.push(hash_pair(a, b)),
                [a] => next.push(a.clone()),
                _ => unreachable!(),
            }
        }
        level = next;
    }
    level.remove(0)
}

/// Standard Merkle inclusion check over sha256 sorted pairs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MerkleVerifier;

impl MembershipVerifier for MerkleVerifier {
    fn verify(&self, root: &str, proof: &[String], identity: &str) -> bool {
        let mut current = hash_identity(identity);
        for sibling in proof {
            current = hash_pair(&current, sibling);
        }
        current == root
    }
}

// ============================================================================
// ACCESS CONTROL
// ============================================================================

/// Flat admin set. The mutable owner singleton of older designs maps to
/// this explicit capability list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminList {
    admins: HashSet<String>,
}

impl AdminList {
    pub fn new(admins: impl IntoIterator<Item = String>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn grant(&mut self, address: &str) {
        self.admins.insert(address.to_string());
    }

    pub fn revoke(&mut self, address: &str) {
        self.admins.remove(address);
    }
}

impl AccessControl for AdminList {
    fn is_authorized(&self, caller: &str) -> bool {
        self.admins.contains(caller)
    }
}
