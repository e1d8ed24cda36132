// Service configuration loaded from the environment (and `.env`).

use crate::oracle::{Ed25519Verifier, PermissiveVerifier, VerifierType};
use crate::runtime::Genesis;
use alloy_primitives::Address;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:1234";
pub const DEFAULT_STATE_FILE: &str = "data/state.json";
pub const DEFAULT_MIN_VOTES: u64 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub state_file: PathBuf,
    pub oracle_min_votes: u64,
    /// Hex Ed25519 key; unset means every proof is accepted (dev mode only).
    pub oracle_attester_pubkey: Option<String>,
    pub oracle_admin: Address,
    pub log_level: String,
    /// Enables `/dev/*` routes and a host-driven clock instead of wall time.
    pub dev_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 1234)),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            oracle_min_votes: DEFAULT_MIN_VOTES,
            oracle_attester_pubkey: None,
            oracle_admin: Address::ZERO,
            log_level: "info".to_string(),
            dev_mode: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; missing keys take defaults.
    ///
    /// Outside dev mode the oracle admin and attester key must be given.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let defaults = Config::default();

        let dev_mode = match lookup("DEV_MODE").as_deref() {
            None | Some("") | Some("0") | Some("false") => false,
            Some("1") | Some("true") => true,
            Some(other) => return Err(format!("Invalid DEV_MODE: {}", other)),
        };

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid BIND_ADDR: {}", e))?;

        let state_file = lookup("STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_file);

        let oracle_min_votes = match lookup("ORACLE_MIN_VOTES") {
            Some(v) => v
                .parse::<u64>()
                .map_err(|e| format!("Invalid ORACLE_MIN_VOTES: {}", e))?,
            None => DEFAULT_MIN_VOTES,
        };
        if oracle_min_votes == 0 {
            return Err("ORACLE_MIN_VOTES must be at least 1".to_string());
        }

        let oracle_attester_pubkey = lookup("ORACLE_ATTESTER_PUBKEY").filter(|k| !k.is_empty());
        if oracle_attester_pubkey.is_none() && !dev_mode {
            return Err("ORACLE_ATTESTER_PUBKEY is required unless DEV_MODE is set".to_string());
        }

        let oracle_admin = match lookup("ORACLE_ADMIN") {
            Some(a) => Address::from_str(&a).map_err(|e| format!("Invalid ORACLE_ADMIN: {}", e))?,
            None if dev_mode => defaults.oracle_admin,
            None => return Err("ORACLE_ADMIN is required unless DEV_MODE is set".to_string()),
        };

        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            bind_addr,
            state_file,
            oracle_min_votes,
            oracle_attester_pubkey,
            oracle_admin,
            log_level,
            dev_mode,
        })
    }

    pub fn verifier(&self) -> Result<VerifierType, String> {
        match &self.oracle_attester_pubkey {
            Some(key) => Ok(VerifierType::Ed25519(Ed25519Verifier::from_hex(key)?)),
            None => {
                warn!("⚠️  No attester key configured: oracle proofs are NOT verified");
                Ok(VerifierType::Permissive(PermissiveVerifier))
            }
        }
    }

    pub fn genesis(&self, time: u64) -> Result<Genesis, String> {
        Ok(Genesis {
            time,
            oracle_admin: self.oracle_admin,
            verifier: self.verifier()?,
            min_votes: self.oracle_min_votes,
        })
    }
}
