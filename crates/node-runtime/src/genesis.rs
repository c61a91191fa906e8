//! Genesis block construction.
//!
//! Every node builds the genesis block locally from the configured
//! deposit list. The construction is deterministic, so identically
//! configured nodes agree on the genesis id without exchanging it.

use crate::config::GenesisDeposit;
use anyhow::{bail, Context, Result};
use rc_01_ssi_state::State;
use rc_02_chain::{keys, Block};
use shared_crypto::{Ed25519PublicKey, Identity, IDENTITY_SEED_LEN};
use shared_types::{Pk, PK_LEN};

fn decode_key(field: &str, raw: &str) -> Result<[u8; PK_LEN]> {
    let bytes = hex::decode(raw).with_context(|| format!("{field} is not hex"))?;
    let key: [u8; PK_LEN] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("{field} must be {PK_LEN} bytes, got {}", bytes.len()))?;
    Ok(key)
}

fn resolve(deposit: &GenesisDeposit) -> Result<(Pk, Ed25519PublicKey)> {
    if !deposit.seed.is_empty() {
        let seed = hex::decode(&deposit.seed).context("genesis seed is not hex")?;
        if seed.len() != IDENTITY_SEED_LEN {
            bail!(
                "genesis seed must be {IDENTITY_SEED_LEN} bytes, got {}",
                seed.len()
            );
        }
        let identity = Identity::from_seed(&seed)?;
        return Ok((identity.pk(), identity.token_pk()));
    }
    let pk = Pk(decode_key("genesis pk", &deposit.pk)?);
    let token_pk = Ed25519PublicKey::from_bytes(decode_key("genesis token_pk", &deposit.token_pk)?)?;
    Ok((pk, token_pk))
}

/// Build the genesis block from the configured deposits.
pub fn build(deposits: &[GenesisDeposit]) -> Result<Block> {
    let mut state = State::new();
    let data = {
        let mut tx = state.begin();
        for deposit in deposits {
            if deposit.stake == 0 {
                bail!("genesis deposit with zero stake");
            }
            let (pk, token_pk) = resolve(deposit)?;
            keys::deposit_stake(&mut tx, &pk, deposit.stake);
            keys::commit_token_pk(&mut tx, &pk, &token_pk);
        }
        tx.into_data()
    };
    let write = state
        .commit(data)
        .context("genesis writes cannot conflict on an empty state")?;
    Ok(Block::genesis(vec![write], 0))
}
