//! State-key conventions.
//!
//! The replicated state keeps protocol bookkeeping under two prefixes:
//!
//! - `s/<pk>` → big-endian u64 stake balance
//! - `t/<pk>` → 32-byte token public key
//!
//! Everything else in the keyspace belongs to applications.

use rc_01_ssi_state::{State, Tx};
use shared_crypto::Ed25519PublicKey;
use shared_types::{Pk, Stake};

const STAKE_PREFIX: &[u8] = b"s/";
const TOKEN_PK_PREFIX: &[u8] = b"t/";

/// State key of an identity's stake balance.
pub fn stake_key(pk: &Pk) -> Vec<u8> {
    [STAKE_PREFIX, pk.as_bytes().as_slice()].concat()
}

/// State key of an identity's committed token public key.
pub fn token_pk_key(pk: &Pk) -> Vec<u8> {
    [TOKEN_PK_PREFIX, pk.as_bytes().as_slice()].concat()
}

/// Read an identity's stake from reconstructed state. Missing or
/// malformed entries read as zero.
pub fn read_stake(state: &State, pk: &Pk) -> Stake {
    state
        .get_ro(&stake_key(pk))
        .and_then(|v| <[u8; 8]>::try_from(v).ok())
        .map(u64::from_be_bytes)
        .unwrap_or(0)
}

/// Read an identity's committed token public key, if any.
pub fn read_token_pk(state: &State, pk: &Pk) -> Option<Ed25519PublicKey> {
    let bytes = state.get_ro(&token_pk_key(pk))?;
    let arr = <[u8; 32]>::try_from(bytes).ok()?;
    Ed25519PublicKey::from_bytes(arr).ok()
}

/// Total stake deposited across all identities.
pub fn total_stake(state: &State) -> Stake {
    let mut total: u64 = 0;
    state.scan_prefix(STAKE_PREFIX, |_, value| {
        if let Ok(arr) = <[u8; 8]>::try_from(value) {
            total = total
                .checked_add(u64::from_be_bytes(arr))
                .expect("total stake overflows u64");
        }
    });
    total
}

/// Record a stake deposit inside a transaction.
pub fn deposit_stake(tx: &mut Tx<'_>, pk: &Pk, stake: Stake) {
    tx.set(&stake_key(pk), &stake.to_be_bytes());
}

/// Commit an identity's token public key inside a transaction.
pub fn commit_token_pk(tx: &mut Tx<'_>, pk: &Pk, token_pk: &Ed25519PublicKey) {
    tx.set(&token_pk_key(pk), token_pk.as_bytes());
}
