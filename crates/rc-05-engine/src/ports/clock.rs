use async_trait::async_trait;

/// Source of round ticks.
///
/// `next` yields `(round, timestamp)` pairs with strictly increasing
/// rounds, and `None` once closed. Timestamps are microseconds since the
/// Unix epoch, matching the block field. All peers must derive rounds
/// from the same epoch so their lotteries line up.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// The most recently yielded round, 0 before the first tick.
    fn round(&self) -> u64;
    /// Wait for the next tick.
    async fn next(&self) -> Option<(u64, u64)>;
    /// Stop ticking; pending and future `next` calls return `None`.
    async fn close(&self);
}
