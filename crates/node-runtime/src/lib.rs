//! # Rondo-Chain Node Runtime
//!
//! The executable node: loads configuration, builds the genesis block,
//! and wires the chain, mempool, clock, and TCP gossip into the engine.
//!
//! ## Modular Structure
//!
//! - `config` - Node configuration loaded from JSON
//! - `genesis` - Deterministic genesis construction from deposits
//! - `adapters` - The TCP implementation of the broadcast port

pub mod adapters;
pub mod config;
pub mod genesis;

use crate::adapters::TcpBroadcast;
use crate::config::NodeConfig;
use anyhow::Result;
use rc_02_chain::{Chain, MemoryStore};
use rc_03_mempool::WritePool;
use rc_05_engine::{Engine, EngineError, RoundClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A fully wired node.
pub struct NodeRuntime {
    engine: Engine<RoundClock, TcpBroadcast>,
}

impl NodeRuntime {
    /// Build every subsystem from `config` and start the engine.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        let identity = config.identity()?;
        info!("[node] identity {}", hex::encode(identity.pk().0));

        let genesis = genesis::build(&config.genesis)?;
        info!("[node] genesis {}", genesis.id());

        let chain = Arc::new(Chain::new(
            Arc::new(MemoryStore::new()),
            genesis,
            config.consensus.weight_points,
        )?);
        let pool = Arc::new(WritePool::new());
        let clock = Arc::new(RoundClock::new(Duration::from_millis(
            config.consensus.round_duration_ms,
        )));
        let broadcast = Arc::new(
            TcpBroadcast::start(
                &config.network.bind,
                &config.network.peers,
                config.network.max_incoming_conn,
                config.network.max_message_buf,
            )
            .await?,
        );

        let engine = Engine::start(
            identity,
            chain,
            pool,
            clock,
            broadcast,
            config.consensus.write_budget,
        );
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &Engine<RoundClock, TcpBroadcast> {
        &self.engine
    }

    /// Stop the engine loops within `deadline`.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), EngineError> {
        info!("[node] shutting down");
        self.engine.shutdown(deadline).await
    }
}
