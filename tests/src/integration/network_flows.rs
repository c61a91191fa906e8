//! # Network Integration Flows
//!
//! Full nodes wired through the runtime: JSON configuration, genesis
//! built from deposits, wall-clock rounds, and gossip over real TCP
//! sockets on localhost.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use node_runtime::config::{ConsensusConfig, GenesisDeposit, NetworkConfig, NodeConfig};
    use node_runtime::NodeRuntime;
    use shared_crypto::{Identity, IDENTITY_SEED_LEN};

    fn seed_hex(n: u8) -> String {
        hex::encode([n; IDENTITY_SEED_LEN])
    }

    fn config_for(n: u8, bind: &str, peers: Vec<String>) -> NodeConfig {
        NodeConfig {
            network: NetworkConfig {
                bind: bind.to_string(),
                peers,
                ..NetworkConfig::default()
            },
            consensus: ConsensusConfig {
                round_duration_ms: 50,
                ..ConsensusConfig::default()
            },
            identity_seed: seed_hex(n),
            // only node 1 holds stake; node 2 follows
            genesis: vec![GenesisDeposit {
                seed: seed_hex(1),
                stake: 1,
                ..GenesisDeposit::default()
            }],
        }
    }

    async fn wait_until(mut probe: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while !probe() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_round_trips_over_tcp() {
        // the follower listens first; the minter's startup dial links
        // them before the first block is minted
        let follower = NodeRuntime::start(config_for(2, "127.0.0.1:19472", Vec::new()))
            .await
            .unwrap();
        let minter = NodeRuntime::start(config_for(
            1,
            "127.0.0.1:19471",
            vec!["127.0.0.1:19472".to_string()],
        ))
        .await
        .unwrap();

        // identical deposits give identical genesis blocks
        assert_eq!(
            minter.engine().chain().genesis_id(),
            follower.engine().chain().genesis_id()
        );

        minter
            .engine()
            .update(|tx| tx.set(b"answer", b"42"))
            .await
            .unwrap();

        let chain = std::sync::Arc::clone(follower.engine().chain());
        wait_until(move || chain.tip().unwrap().round() > 0).await;
        wait_until(|| {
            follower
                .engine()
                .view(|state| state.get_ro(b"answer").map(<[u8]>::to_vec))
                .unwrap()
                == Some(b"42".to_vec())
        })
        .await;

        // a follower without stake never mints
        let tip = follower.engine().chain().tip().unwrap();
        let mut minters = Vec::new();
        follower
            .engine()
            .chain()
            .walk(tip, |_, block, _| {
                if !block.is_genesis() {
                    minters.push(block.pk);
                }
                Ok(())
            })
            .unwrap();
        let follower_pk = Identity::from_seed(&[2u8; IDENTITY_SEED_LEN]).unwrap().pk();
        assert!(minters.iter().all(|pk| *pk != follower_pk));

        minter.shutdown(Duration::from_secs(2)).await.unwrap();
        follower.shutdown(Duration::from_secs(2)).await.unwrap();
    }
}
