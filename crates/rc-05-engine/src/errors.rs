use rc_01_ssi_state::SsiError;
use rc_02_chain::ChainError;
use rc_03_mempool::MempoolError;
use thiserror::Error;

/// Errors surfaced by the engine and its ports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The broadcast or clock channel is closed.
    #[error("channel closed")]
    Closed,
    /// A peer refused or dropped the connection.
    #[error("peer refused the connection")]
    PeerRefused,
    /// Shutdown did not complete before the deadline.
    #[error("shutdown deadline elapsed")]
    Deadline,
    /// A local transaction was rejected at commit.
    #[error("commit rejected: {0}")]
    Commit(SsiError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Mempool(#[from] MempoolError),
}
