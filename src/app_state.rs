// Application state management

use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::config::ProtocolConfig;
use crate::engine::{ConsensusMarket, EngineSnapshot};
use crate::external::{AdminList, SystemClock};

pub type SharedState = Arc<Mutex<AppState>>;

const STATE_FILE: &str = "data/state.json";

pub struct AppState {
    pub engine: ConsensusMarket,
    state_path: String,
}

impl AppState {
    pub fn new() -> Self {
        info!("🚀 initializing Crowdcast consensus market");

        let config = config_from_env();
        let admins = admins_from_env();
        let state_path =
            std::env::var("STATE_PATH").unwrap_or_else(|_| STATE_FILE.to_string());

        let engine = match ConsensusMarket::new(config, admins, Arc::new(SystemClock)) {
            Ok(engine) => engine,
            Err(err) => {
                warn!(%err, "invalid protocol config in environment, using defaults");
                ConsensusMarket::with_system_clock()
            }
        };

        let mut state = Self { engine, state_path };

        if let Ok(()) = state.load_from_disk() {
            info!("✅ loaded persisted state from disk");
        } else {
            info!("ℹ️ no persisted state found, starting fresh");
        }

        state
    }

    pub fn save_to_disk(&self) -> Result<(), String> {
        let snapshot = self.engine.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| format!("failed to serialize state: {}", e))?;

        if let Some(parent) = std::path::Path::new(&self.state_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create state directory: {}", e))?;
        }
        std::fs::write(&self.state_path, json)
            .map_err(|e| format!("failed to write state file: {}", e))?;

        info!(path = %self.state_path, "💾 state saved to disk");
        Ok(())
    }

    fn load_from_disk(&mut self) -> Result<(), String> {
        let json =
            std::fs::read_to_string(&self.state_path).map_err(|_| "no state file found")?;
        let snapshot: EngineSnapshot = serde_json::from_str(&json)
            .map_err(|e| format!("failed to deserialize state: {}", e))?;
        self.engine.restore(snapshot);
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Protocol parameters from the environment, falling back to defaults
/// field by field.
fn config_from_env() -> ProtocolConfig {
    let defaults = ProtocolConfig::default();

    fn env_u64(key: &str, fallback: u64) -> u64 {
        std::env::var(key)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(fallback)
    }

    ProtocolConfig {
        platform_fee_bps: env_u64("PLATFORM_FEE_BPS", defaults.platform_fee_bps),
        creator_fee_bps: env_u64("CREATOR_FEE_BPS", defaults.creator_fee_bps),
        community_fee_bps: env_u64("COMMUNITY_FEE_BPS", defaults.community_fee_bps),
        platform_treasury: std::env::var("PLATFORM_TREASURY")
            .unwrap_or(defaults.platform_treasury),
        community_treasury: std::env::var("COMMUNITY_TREASURY")
            .unwrap_or(defaults.community_treasury),
        creation_fee: env_u64("CREATION_FEE", defaults.creation_fee),
        gated_creation: std::env::var("GATED_CREATION")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(defaults.gated_creation),
    }
}

/// Comma-separated admin addresses from ADMIN_ADDRESSES
fn admins_from_env() -> AdminList {
    let raw = std::env::var("ADMIN_ADDRESSES").unwrap_or_default();
    AdminList::new(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
    )
}
