//! Node configuration.
//!
//! Loaded from a JSON file whose path comes from the command line;
//! every field has a default so a minimal file only names what differs.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use shared_crypto::{Identity, IDENTITY_SEED_LEN};
use std::path::Path;

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub consensus: ConsensusConfig,
    /// Hex-encoded 64-byte identity seed. Empty means a fresh ephemeral
    /// identity, which can follow the chain but holds no stake.
    pub identity_seed: String,
    /// Initial stake deposits baked into the genesis block. Must be
    /// identical on every node of the network.
    pub genesis: Vec<GenesisDeposit>,
}

/// Gossip transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listen address for incoming peer connections.
    pub bind: String,
    /// Peer addresses to dial; redials on disconnect.
    pub peers: Vec<String>,
    /// Incoming connections beyond this are refused.
    pub max_incoming_conn: usize,
    /// Capacity of the inbound message buffer.
    pub max_message_buf: usize,
}

/// Round and block production settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Wall-clock length of a round in milliseconds.
    pub round_duration_ms: u64,
    /// Points shared per round by the fork-choice rule.
    pub weight_points: u64,
    /// Maximum writes packed into a minted block; 0 means unbounded.
    pub write_budget: usize,
}

/// One genesis stake deposit.
///
/// Either a 64-byte hex `seed` (from which both public keys derive) or
/// an explicit hex `pk` plus `token_pk` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisDeposit {
    pub seed: String,
    pub pk: String,
    pub token_pk: String,
    pub stake: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            consensus: ConsensusConfig::default(),
            identity_seed: String::new(),
            genesis: Vec::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9340".to_string(),
            peers: Vec::new(),
            max_incoming_conn: 64,
            max_message_buf: 1024,
        }
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            round_duration_ms: 1000,
            weight_points: rc_02_chain::DEFAULT_WEIGHT_POINTS,
            write_budget: 0,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.consensus.round_duration_ms == 0 {
            bail!("round_duration_ms must be positive");
        }
        if self.consensus.weight_points == 0 {
            bail!("weight_points must be positive");
        }
        Ok(())
    }

    /// The node's identity: derived from `identity_seed`, or ephemeral
    /// when the seed is empty.
    pub fn identity(&self) -> Result<Identity> {
        if self.identity_seed.is_empty() {
            return Ok(Identity::generate());
        }
        let seed = hex::decode(&self.identity_seed).context("identity_seed is not hex")?;
        if seed.len() != IDENTITY_SEED_LEN {
            bail!(
                "identity_seed must be {IDENTITY_SEED_LEN} bytes, got {}",
                seed.len()
            );
        }
        Ok(Identity::from_seed(&seed)?)
    }
}
