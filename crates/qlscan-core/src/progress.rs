//! Download progress reporting.

/// Receives progress updates for a streamed transfer
///
/// Called once per received chunk, so implementations must return quickly
/// and never block.
pub trait ProgressSink: Send + Sync {
    /// Transfer started; `total` comes from `Content-Length` when present
    fn start(&self, total: Option<u64>);

    /// Cumulative bytes received so far
    fn advance(&self, received: u64);

    /// Transfer finished (successfully or not)
    fn finish(&self);
}

/// Sink that discards all updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _total: Option<u64>) {}

    fn advance(&self, _received: u64) {}

    fn finish(&self) {}
}
