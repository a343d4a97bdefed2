//! Metrics sinks - where per-operation latency and throughput go.
//!
//! Both values are gauges: a sink keeps the latest value and nothing
//! else. Processing holds an `Arc<dyn MetricsSink>` and never learns which
//! backend is behind it. A sink error is counted by the caller and
//! otherwise ignored.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};

use ::metrics::{describe_gauge, gauge};

use crate::error::MetricsError;

/// Gauge name for the last observed latency, in microseconds
pub const LATENCY_GAUGE: &str = "hft_latency_us";
/// Gauge name for the last observed throughput, in operations per second
pub const THROUGHPUT_GAUGE: &str = "hft_throughput_ops";

/// Capability to publish the two gauges.
pub trait MetricsSink: Send + Sync {
    fn record_latency(&self, micros: f64) -> Result<(), MetricsError>;
    fn record_throughput(&self, ops_per_sec: f64) -> Result<(), MetricsError>;
}

/// Keeps the latest values in atomics so other threads can read them.
#[derive(Debug, Default)]
pub struct GaugeSink {
    latency_bits: AtomicU64,
    throughput_bits: AtomicU64,
    updates: AtomicU64,
}

impl GaugeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest latency in microseconds (0.0 before the first update)
    #[inline]
    pub fn latency_us(&self) -> f64 {
        f64::from_bits(self.latency_bits.load(Ordering::Relaxed))
    }

    /// Latest throughput in operations per second
    #[inline]
    pub fn throughput_ops(&self) -> f64 {
        f64::from_bits(self.throughput_bits.load(Ordering::Relaxed))
    }

    /// Number of latency updates received
    #[inline]
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

impl MetricsSink for GaugeSink {
    fn record_latency(&self, micros: f64) -> Result<(), MetricsError> {
        self.latency_bits.store(micros.to_bits(), Ordering::Relaxed);
        self.updates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn record_throughput(&self, ops_per_sec: f64) -> Result<(), MetricsError> {
        self.throughput_bits
            .store(ops_per_sec.to_bits(), Ordering::Relaxed);
        Ok(())
    }
}

/// Publishes through the `metrics` facade.
///
/// Whatever recorder the binary installs (a Prometheus exporter, say)
/// receives the gauges. Without a recorder the updates are dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct FacadeSink;

impl FacadeSink {
    pub fn new() -> Self {
        static DESCRIBE: Once = Once::new();
        DESCRIBE.call_once(|| {
            describe_gauge!(LATENCY_GAUGE, "Latency of the last processed order in microseconds");
            describe_gauge!(THROUGHPUT_GAUGE, "Instantaneous throughput in operations per second");
        });
        Self
    }
}

impl MetricsSink for FacadeSink {
    fn record_latency(&self, micros: f64) -> Result<(), MetricsError> {
        if !micros.is_finite() {
            return Err(MetricsError::Rejected {
                metric: LATENCY_GAUGE,
                value: micros,
            });
        }
        gauge!(LATENCY_GAUGE).set(micros);
        Ok(())
    }

    fn record_throughput(&self, ops_per_sec: f64) -> Result<(), MetricsError> {
        if !ops_per_sec.is_finite() {
            return Err(MetricsError::Rejected {
                metric: THROUGHPUT_GAUGE,
                value: ops_per_sec,
            });
        }
        gauge!(THROUGHPUT_GAUGE).set(ops_per_sec);
        Ok(())
    }
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn record_latency(&self, _micros: f64) -> Result<(), MetricsError> {
        Ok(())
    }

    fn record_throughput(&self, _ops_per_sec: f64) -> Result<(), MetricsError> {
        Ok(())
    }
}

/// Forwards to every inner sink. Reports the first failure after all
/// sinks have been tried.
#[derive(Clone, Default)]
pub struct TeeSink {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Arc<dyn MetricsSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn MetricsSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn fan_out(
        &self,
        mut record: impl FnMut(&dyn MetricsSink) -> Result<(), MetricsError>,
    ) -> Result<(), MetricsError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = record(sink.as_ref()) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl MetricsSink for TeeSink {
    fn record_latency(&self, micros: f64) -> Result<(), MetricsError> {
        self.fan_out(|sink| sink.record_latency(micros))
    }

    fn record_throughput(&self, ops_per_sec: f64) -> Result<(), MetricsError> {
        self.fan_out(|sink| sink.record_throughput(ops_per_sec))
    }
}
