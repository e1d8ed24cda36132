// Application state management

use crate::config::Config;
use crate::runtime::Chain;
use std::fs;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

pub type SharedState = Arc<Mutex<AppState>>;

/// Current Unix time in seconds.
pub fn wall_clock() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

const MAX_ACTIVITY: usize = 1000;

pub struct AppState {
    pub chain: Chain,
    pub config: Config,
    pub activity: Vec<String>,
}

impl AppState {
    /// Loads the persisted chain, or starts a fresh one at the current time.
    pub fn new(config: Config) -> Result<Self, String> {
        info!("🚀 Initializing conditional markets node...");
        let chain = match Self::load_from_disk(&config) {
            Ok(chain) => {
                info!("✅ Loaded persisted state from {}", config.state_file.display());
                chain
            }
            Err(e) => {
                info!("ℹ️  No persisted state ({}), starting fresh", e);
                Chain::new(config.genesis(wall_clock())?).map_err(|e| e.to_string())?
            }
        };
        Ok(Self::with_chain(chain, config))
    }

    pub fn with_chain(chain: Chain, config: Config) -> Self {
        info!(
            "🔗 Ledger {} | factory {} | oracle {} (height {}, t={})",
            chain.ledger.address,
            chain.factory.address,
            chain.oracle.address,
            chain.height(),
            chain.now()
        );
        Self { chain, config, activity: Vec::new() }
    }

    pub fn shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    pub fn save_to_disk(&self) -> Result<(), String> {
        let json = serde_json::to_string_pretty(&self.chain)
            .map_err(|e| format!("Failed to serialize state: {}", e))?;

        if let Some(dir) = self.config.state_file.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .map_err(|e| format!("Failed to create state directory: {}", e))?;
            }
        }
        // The state file is only ever replaced whole
        let tmp = self
            .config
            .state_file
            .with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, json).map_err(|e| format!("Failed to write state file: {}", e))?;
        fs::rename(&tmp, &self.config.state_file)
            .map_err(|e| format!("Failed to replace state file: {}", e))?;

        info!("💾 State saved to {}", self.config.state_file.display());
        Ok(())
    }

    fn load_from_disk(config: &Config) -> Result<Chain, String> {
        let json = fs::read_to_string(&config.state_file)
            .map_err(|_| "no state file found".to_string())?;
        serde_json::from_str(&json).map_err(|e| {
            warn!("⚠️  State file {} is unreadable", config.state_file.display());
            format!("Failed to deserialize state: {}", e)
        })
    }

    pub fn log_activity(&mut self, emoji: &str, action: &str, details: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let entry = format!("[{}] {} {} | {}", timestamp, emoji, action, details);
        info!("{}", entry);
        self.activity.push(entry);
        if self.activity.len() > MAX_ACTIVITY {
            self.activity.remove(0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};

    fn temp_config(name: &str) -> Config {
        let dir = std::env::temp_dir().join(format!("conditional-markets-{}", uuid::Uuid::new_v4()));
        Config { state_file: dir.join(name), ..Config::default() }
    }

    #[test]
    fn test_state_survives_restart() {
        let config = temp_config("state.json");
        let mut state = AppState::new(config.clone()).unwrap();
        state
            .chain
            .prepare_condition(Address::repeat_byte(0x0a), B256::repeat_byte(3), 2)
            .unwrap();
        state.save_to_disk().unwrap();

        let reloaded = AppState::new(config.clone()).unwrap();
        assert_eq!(reloaded.chain.height(), 1);
        assert_eq!(reloaded.chain.ledger.conditions().count(), 1);
        let _ = fs::remove_dir_all(config.state_file.parent().unwrap());
    }

    #[test]
    fn test_activity_is_capped() {
        let mut state = AppState::new(temp_config("unused.json")).unwrap();
        for i in 0..(MAX_ACTIVITY + 5) {
            state.log_activity("🧪", "TEST", &i.to_string());
        }
        assert_eq!(state.activity.len(), MAX_ACTIVITY);
        assert!(state.activity[0].ends_with("| 5"));
    }
}
