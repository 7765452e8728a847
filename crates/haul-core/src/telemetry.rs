//! Lightweight network telemetry.
//!
//! Tracks bytes sent and the last observed round-trip time; the chunk-size
//! predictor uses the derived bandwidth/latency estimates. One instance per
//! sender process, passed explicitly.

use std::sync::RwLock;
use std::time::{Duration, Instant};

struct TelemetryInner {
    window_start: Instant,
    bytes_sent: u64,
    last_rtt: Option<Duration>,
}

/// Collector for simple transfer metrics.
pub struct TelemetryCollector {
    inner: RwLock<TelemetryInner>,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TelemetryInner {
                window_start: Instant::now(),
                bytes_sent: 0,
                last_rtt: None,
            }),
        }
    }

    /// Record that `n` bytes were sent.
    pub fn record_bytes_sent(&self, n: u64) {
        if n == 0 {
            return;
        }
        let mut inner = self.inner.write().unwrap();
        inner.bytes_sent += n;
    }

    /// Record the latest round-trip time measurement.
    pub fn record_rtt(&self, rtt: Duration) {
        if rtt.is_zero() {
            return;
        }
        let mut inner = self.inner.write().unwrap();
        inner.last_rtt = Some(rtt);
    }

    /// Estimated bandwidth in megabits per second over the current window;
    /// zero until data has been sent.
    pub fn bandwidth_mbps(&self) -> f64 {
        let inner = self.inner.read().unwrap();
        let elapsed = inner.window_start.elapsed().as_secs_f64();
        if elapsed <= 0.0 || inner.bytes_sent == 0 {
            return 0.0;
        }
        (inner.bytes_sent as f64 * 8.0) / elapsed / 1e6
    }

    /// Last recorded RTT in milliseconds; zero when none has been recorded.
    pub fn latency_ms(&self) -> f64 {
        let inner = self.inner.read().unwrap();
        inner
            .last_rtt
            .map_or(0.0, |rtt| rtt.as_secs_f64() * 1000.0)
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
