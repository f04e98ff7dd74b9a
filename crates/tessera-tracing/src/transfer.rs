//! Timing for memory transfers
//!
//! A [`TransferSpan`] is started right before bytes move and dropped once the
//! copy has been issued. On drop it emits one `debug!` event carrying the
//! duration and bandwidth, unless the transfer finished faster than the
//! configured threshold.
//!
//! ## Example
//!
//! ```rust
//! use tessera_tracing::transfer::TransferSpan;
//!
//! {
//!     let _span = TransferSpan::new("flat", 4096).between("system", "cuda");
//!     // ... issue the copy ...
//! } // logged here
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const NO_THRESHOLD: u64 = u64::MAX;

static THRESHOLD_US: AtomicU64 = AtomicU64::new(NO_THRESHOLD);

/// Set the process-wide minimum duration for transfer events
///
/// `None` logs every transfer. Installed by
/// [`init_global_tracing`](crate::init_global_tracing) from
/// [`TracingConfig::transfer_threshold_us`](crate::TracingConfig::transfer_threshold_us).
pub fn set_transfer_threshold(threshold_us: Option<u64>) {
    THRESHOLD_US.store(threshold_us.unwrap_or(NO_THRESHOLD), Ordering::Relaxed);
}

/// Current process-wide transfer threshold
pub fn transfer_threshold() -> Option<u64> {
    match THRESHOLD_US.load(Ordering::Relaxed) {
        NO_THRESHOLD => None,
        us => Some(us),
    }
}

/// Bandwidth in MiB/s for `bytes` moved in `duration_us`
pub fn bandwidth_mibps(bytes: usize, duration_us: u64) -> f64 {
    if duration_us == 0 {
        return 0.0;
    }
    (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
}

/// RAII timer for a single transfer
#[derive(Debug)]
pub struct TransferSpan {
    path: &'static str,
    bytes: usize,
    src: &'static str,
    dst: &'static str,
    threshold_us: Option<u64>,
    start_time: Instant,
}

impl TransferSpan {
    /// Start timing a transfer of `bytes` bytes along `path` (`flat`, `2d`, ...)
    ///
    /// Picks up the process-wide threshold; override it with
    /// [`TransferSpan::with_threshold`].
    pub fn new(path: &'static str, bytes: usize) -> Self {
        Self {
            path,
            bytes,
            src: "",
            dst: "",
            threshold_us: transfer_threshold(),
            start_time: Instant::now(),
        }
    }

    /// Record the source and destination space names
    pub fn between(mut self, src: &'static str, dst: &'static str) -> Self {
        self.src = src;
        self.dst = dst;
        self
    }

    pub fn with_threshold(mut self, threshold_us: Option<u64>) -> Self {
        self.threshold_us = threshold_us;
        self
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn threshold_us(&self) -> Option<u64> {
        self.threshold_us
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }
}

impl Drop for TransferSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();

        if self.threshold_us.map_or(true, |t| elapsed_us >= t) {
            tracing::debug!(
                path = self.path,
                src = self.src,
                dst = self.dst,
                bytes = self.bytes,
                duration_us = elapsed_us,
                bandwidth_mibps = bandwidth_mibps(self.bytes, elapsed_us),
                "transfer_complete"
            );
        }
    }
}
