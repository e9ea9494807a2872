//! Relay counters.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for relay activity.
///
/// Shared by every run a relay (or its clones) processes.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Raw events read from upstream.
    received: AtomicU64,
    /// Events delivered to the consumer, sentinels excluded.
    forwarded: AtomicU64,
    /// Recoverable errors surfaced as status events.
    diagnostics: AtomicU64,
    /// Events that changed nothing and were not forwarded.
    suppressed: AtomicU64,
    /// Upstream faults.
    faults: AtomicU64,
    /// Runs stopped by the consumer.
    cancellations: AtomicU64,
    last_forward_time: RwLock<Option<Instant>>,
}

impl RelayMetrics {
    /// Records a raw event read from upstream.
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an event delivered to the consumer.
    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        *self.last_forward_time.write() = Some(Instant::now());
    }

    /// Records a recoverable error surfaced downstream.
    pub fn record_diagnostic(&self) {
        self.diagnostics.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an event that was absorbed without forwarding.
    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an upstream fault.
    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a consumer cancellation.
    pub fn record_cancellation(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of raw events received.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Returns the number of forwarded events.
    #[must_use]
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Returns the number of diagnostics.
    #[must_use]
    pub fn diagnostics(&self) -> u64 {
        self.diagnostics.load(Ordering::Relaxed)
    }

    /// Returns the number of suppressed events.
    #[must_use]
    pub fn suppressed(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// Returns the number of upstream faults.
    #[must_use]
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    /// Returns the number of cancelled runs.
    #[must_use]
    pub fn cancellations(&self) -> u64 {
        self.cancellations.load(Ordering::Relaxed)
    }

    /// Returns milliseconds since the last forwarded event.
    #[must_use]
    pub fn ms_since_last_forward(&self) -> Option<f64> {
        self.last_forward_time
            .read()
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
    }

    /// Converts metrics to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "received": self.received(),
            "forwarded": self.forwarded(),
            "diagnostics": self.diagnostics(),
            "suppressed": self.suppressed(),
            "faults": self.faults(),
            "cancellations": self.cancellations(),
        })
    }
}
