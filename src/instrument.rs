//! Latency/throughput instrumentation around the hot path.
//!
//! `LatencyProbe::measure` timestamps a closure with a monotonic clock
//! pair, derives `throughput = 1_000_000 / elapsed_us` and forwards both
//! to the metrics sink. A failing sink is counted and logged, never
//! surfaced to the caller. A nanosecond histogram is kept on the side for
//! the end-of-run report.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hdrhistogram::Histogram;
use tracing::warn;

use crate::metrics::MetricsSink;

/// Smallest elapsed time reported, in microseconds. A region faster than
/// the clock can resolve reads as one nanosecond.
pub const MIN_ELAPSED_US: f64 = 0.001;

/// Histogram ceiling: one minute in nanoseconds
const HISTOGRAM_MAX_NS: u64 = 60_000_000_000;

/// One timed region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Elapsed wall time, always > 0
    pub elapsed_us: f64,
    /// `1_000_000 / elapsed_us`
    pub throughput: f64,
}

impl Sample {
    pub fn from_elapsed(elapsed: Duration) -> Self {
        let elapsed_us = (elapsed.as_secs_f64() * 1e6).max(MIN_ELAPSED_US);
        Self {
            elapsed_us,
            throughput: 1_000_000.0 / elapsed_us,
        }
    }
}

/// Times regions and publishes each sample to a sink.
pub struct LatencyProbe {
    sink: Arc<dyn MetricsSink>,
    histogram: Histogram<u64>,
    throughput_sum: f64,
    samples: u64,
    sink_failures: u64,
}

impl LatencyProbe {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            histogram: new_histogram(),
            throughput_sum: 0.0,
            samples: 0,
            sink_failures: 0,
        }
    }

    /// Run `f` and time it.
    #[inline]
    pub fn measure<R>(&mut self, f: impl FnOnce() -> R) -> (R, Sample) {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        let sample = Sample::from_elapsed(elapsed);
        self.observe(elapsed, sample);
        (result, sample)
    }

    fn observe(&mut self, elapsed: Duration, sample: Sample) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX).max(1);
        self.histogram.saturating_record(nanos);
        self.throughput_sum += sample.throughput;
        self.samples += 1;

        let latency = self.sink.record_latency(sample.elapsed_us);
        let throughput = self.sink.record_throughput(sample.throughput);
        for result in [latency, throughput] {
            if let Err(e) = result {
                self.sink_failures += 1;
                if self.sink_failures == 1 || self.sink_failures % 1000 == 0 {
                    warn!(error = %e, failures = self.sink_failures, "metrics sink failed");
                }
            }
        }
    }

    /// Samples taken so far
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Sink calls that returned an error
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures
    }

    /// Summarize everything measured so far.
    pub fn report(&self) -> LatencyReport {
        let h = &self.histogram;
        let empty = h.is_empty();
        let at = |q: f64| if empty { 0 } else { h.value_at_quantile(q) };

        LatencyReport {
            samples: self.samples,
            min_ns: if empty { 0 } else { h.min() },
            p50_ns: at(0.50),
            p90_ns: at(0.90),
            p99_ns: at(0.99),
            p999_ns: at(0.999),
            max_ns: if empty { 0 } else { h.max() },
            mean_ns: if empty { 0.0 } else { h.mean() },
            mean_throughput: if self.samples == 0 {
                0.0
            } else {
                self.throughput_sum / self.samples as f64
            },
            sink_failures: self.sink_failures,
        }
    }

    /// Forget all samples (the sink is kept).
    pub fn reset(&mut self) {
        self.histogram.reset();
        self.throughput_sum = 0.0;
        self.samples = 0;
        self.sink_failures = 0;
    }
}

impl fmt::Debug for LatencyProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyProbe")
            .field("samples", &self.samples)
            .field("sink_failures", &self.sink_failures)
            .finish_non_exhaustive()
    }
}

fn new_histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(1, HISTOGRAM_MAX_NS, 3)
        .expect("constant histogram bounds are valid")
}

/// End-of-run latency summary.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatencyReport {
    pub samples: u64,
    pub min_ns: u64,
    pub p50_ns: u64,
    pub p90_ns: u64,
    pub p99_ns: u64,
    pub p999_ns: u64,
    pub max_ns: u64,
    pub mean_ns: f64,
    pub mean_throughput: f64,
    pub sink_failures: u64,
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Latency Report (ns) ===")?;
        writeln!(f, "Samples:    {}", self.samples)?;
        writeln!(f, "Throughput: {:.2} ops/sec (mean)", self.mean_throughput)?;
        writeln!(f, "---------------------------")?;
        writeln!(f, "Min:    {:8} ns", self.min_ns)?;
        writeln!(f, "P50:    {:8} ns", self.p50_ns)?;
        writeln!(f, "P90:    {:8} ns", self.p90_ns)?;
        writeln!(f, "P99:    {:8} ns", self.p99_ns)?;
        writeln!(f, "P99.9:  {:8} ns", self.p999_ns)?;
        writeln!(f, "Max:    {:8} ns", self.max_ns)?;
        writeln!(f, "Mean:   {:8.1} ns", self.mean_ns)?;
        write!(f, "---------------------------")?;
        if self.sink_failures > 0 {
            write!(f, "\nSink failures: {}", self.sink_failures)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricsError;
    use crate::metrics::{GaugeSink, NoopSink};

    struct Failing;

    impl MetricsSink for Failing {
        fn record_latency(&self, _micros: f64) -> Result<(), MetricsError> {
            Err(MetricsError::Unavailable("offline".into()))
        }

        fn record_throughput(&self, _ops_per_sec: f64) -> Result<(), MetricsError> {
            Err(MetricsError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn test_sample_throughput() {
        let sample = Sample::from_elapsed(Duration::from_micros(4));
        assert_eq!(sample.elapsed_us, 4.0);
        assert_eq!(sample.throughput, 250_000.0);
    }

    #[test]
    fn test_zero_elapsed_is_floored() {
        let sample = Sample::from_elapsed(Duration::ZERO);
        assert_eq!(sample.elapsed_us, MIN_ELAPSED_US);
        assert!(sample.throughput.is_finite());
        assert!(sample.throughput > 0.0);
    }

    #[test]
    fn test_measure_returns_closure_result() {
        let mut probe = LatencyProbe::new(Arc::new(NoopSink));
        let (value, sample) = probe.measure(|| 6 * 7);
        assert_eq!(value, 42);
        assert!(sample.elapsed_us > 0.0);
        assert_eq!(probe.samples(), 1);
    }

    #[test]
    fn test_measure_forwards_to_sink() {
        let sink = Arc::new(GaugeSink::new());
        let mut probe = LatencyProbe::new(sink.clone());

        let (_, sample) = probe.measure(|| std::thread::sleep(Duration::from_millis(1)));

        assert_eq!(sink.latency_us(), sample.elapsed_us);
        assert_eq!(sink.throughput_ops(), sample.throughput);
        assert!(sample.elapsed_us >= 1_000.0);
    }

    #[test]
    fn test_failing_sink_is_counted_not_propagated() {
        let mut probe = LatencyProbe::new(Arc::new(Failing));
        for i in 0..10 {
            let (value, _) = probe.measure(|| i);
            assert_eq!(value, i);
        }
        assert_eq!(probe.samples(), 10);
        assert_eq!(probe.sink_failures(), 20);
    }

    #[test]
    fn test_report() {
        let mut probe = LatencyProbe::new(Arc::new(NoopSink));
        assert_eq!(probe.report(), LatencyReport::default());

        for _ in 0..100 {
            probe.measure(|| std::hint::black_box(1 + 1));
        }
        let report = probe.report();
        assert_eq!(report.samples, 100);
        assert!(report.min_ns >= 1);
        assert!(report.min_ns <= report.p50_ns);
        assert!(report.p50_ns <= report.p99_ns);
        assert!(report.p99_ns <= report.max_ns);
        assert!(report.mean_throughput > 0.0);
        assert!(report.to_string().contains("P99.9"));

        probe.reset();
        assert_eq!(probe.samples(), 0);
    }
}
