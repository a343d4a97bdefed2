//! Run-result export.
//!
//! The processing thread can record one point per order into a
//! `SeriesRecorder`. After the run the series are handed to an
//! `ExportSink`: `CsvExporter` for external plotting, `TextSummary` for a
//! console digest.
//!
//! ```text
//! Time,Price,MovingAvg,Volume,LatencyUs,Throughput
//! 0.000012,100.250000,100.250000,37.000000,0.812000,1231527.093596
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::info;

use crate::error::ExportError;
use crate::instrument::Sample;
use crate::order::Order;

/// A named column of values, aligned with the axis it is exported against.
#[derive(Clone, Copy, Debug)]
pub struct NamedSeries<'a> {
    pub name: &'a str,
    pub values: &'a [f64],
}

impl<'a> NamedSeries<'a> {
    pub fn new(name: &'a str, values: &'a [f64]) -> Self {
        Self { name, values }
    }
}

/// Destination for exported series.
pub trait ExportSink {
    /// Export every series against a shared axis.
    fn export(
        &mut self,
        axis_name: &str,
        axis: &[f64],
        series: &[NamedSeries<'_>],
    ) -> Result<(), ExportError>;
}

fn validate(axis: &[f64], series: &[NamedSeries<'_>]) -> Result<(), ExportError> {
    if series.is_empty() {
        return Err(ExportError::EmptySeries);
    }
    for s in series {
        if s.values.len() != axis.len() {
            return Err(ExportError::LengthMismatch {
                name: s.name.to_string(),
                expected: axis.len(),
                actual: s.values.len(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// CSV
// ============================================================================

/// Writes one CSV file: a header row, then one row per axis point.
#[derive(Clone, Debug)]
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExportSink for CsvExporter {
    fn export(
        &mut self,
        axis_name: &str,
        axis: &[f64],
        series: &[NamedSeries<'_>],
    ) -> Result<(), ExportError> {
        validate(axis, series)?;

        let mut writer = csv::Writer::from_path(&self.path)?;

        let header = std::iter::once(axis_name).chain(series.iter().map(|s| s.name));
        writer.write_record(header)?;

        let mut row = Vec::with_capacity(series.len() + 1);
        for (i, x) in axis.iter().enumerate() {
            row.clear();
            row.push(format!("{x:.6}"));
            row.extend(series.iter().map(|s| format!("{:.6}", s.values[i])));
            writer.write_record(&row)?;
        }
        writer.flush()?;

        info!(path = %self.path.display(), rows = axis.len(), columns = series.len() + 1, "exported csv");
        Ok(())
    }
}

// ============================================================================
// Text summary
// ============================================================================

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 40;

/// Per-series statistics rendered as text.
pub struct TextSummary<W: Write> {
    out: W,
    title: String,
}

impl<W: Write> TextSummary<W> {
    pub fn new(out: W, title: impl Into<String>) -> Self {
        Self {
            out,
            title: title.into(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ExportSink for TextSummary<W> {
    fn export(
        &mut self,
        axis_name: &str,
        axis: &[f64],
        series: &[NamedSeries<'_>],
    ) -> Result<(), ExportError> {
        validate(axis, series)?;

        writeln!(self.out, "=== {} ===", self.title)?;
        writeln!(self.out, "Generated: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))?;
        match (axis.first(), axis.last()) {
            (Some(first), Some(last)) => writeln!(
                self.out,
                "{axis_name}: {} points over [{first:.6}, {last:.6}]",
                axis.len()
            )?,
            _ => writeln!(self.out, "{axis_name}: no data")?,
        }

        for s in series {
            match Stats::of(s.values) {
                Some(stats) => writeln!(
                    self.out,
                    "{:<12} min {:>14.4}  max {:>14.4}  mean {:>14.4}  last {:>14.4}  {}",
                    s.name,
                    stats.min,
                    stats.max,
                    stats.mean,
                    stats.last,
                    sparkline(s.values, SPARK_WIDTH)
                )?,
                None => writeln!(self.out, "{:<12} (empty)", s.name)?,
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Stats {
    min: f64,
    max: f64,
    mean: f64,
    last: f64,
}

impl Stats {
    fn of(values: &[f64]) -> Option<Self> {
        let last = *values.last()?;
        let (min, max, sum) = values.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v),
        );
        Some(Self {
            min,
            max,
            mean: sum / values.len() as f64,
            last,
        })
    }
}

/// Downsample `values` to at most `width` buckets and draw them.
fn sparkline(values: &[f64], width: usize) -> String {
    let Some(stats) = Stats::of(values) else {
        return String::new();
    };
    let range = stats.max - stats.min;
    let chunk = values.len().div_ceil(width.max(1));

    values
        .chunks(chunk)
        .map(|c| {
            let avg = c.iter().sum::<f64>() / c.len() as f64;
            let level = if range > 0.0 {
                ((avg - stats.min) / range * (SPARK.len() - 1) as f64).round() as usize
            } else {
                0
            };
            SPARK[level.min(SPARK.len() - 1)]
        })
        .collect()
}

// ============================================================================
// Recording
// ============================================================================

/// Collects one point per processed order.
#[derive(Clone, Debug)]
pub struct SeriesRecorder {
    started: Instant,
    time: Vec<f64>,
    price: Vec<f64>,
    moving_avg: Vec<f64>,
    volume: Vec<f64>,
    cum_pnl: Vec<f64>,
    latency_us: Vec<f64>,
    throughput: Vec<f64>,
    price_sum: f64,
    pnl: f64,
    prev_price: Option<f64>,
}

impl SeriesRecorder {
    /// Axis label used for exports
    pub const AXIS: &'static str = "Time";

    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            started: Instant::now(),
            time: Vec::with_capacity(capacity),
            price: Vec::with_capacity(capacity),
            moving_avg: Vec::with_capacity(capacity),
            volume: Vec::with_capacity(capacity),
            cum_pnl: Vec::with_capacity(capacity),
            latency_us: Vec::with_capacity(capacity),
            throughput: Vec::with_capacity(capacity),
            price_sum: 0.0,
            pnl: 0.0,
            prev_price: None,
        }
    }

    /// Record a processed order and its timing.
    ///
    /// PnL alternates position each order: long on even indices, short on
    /// odd ones, sized by the order's quantity. The first order is its own
    /// reference price, so the series starts at zero.
    pub fn record(&mut self, order: &Order, sample: Sample) {
        let index = self.price.len();
        let volume = f64::from(order.qty);
        let direction = if index % 2 == 0 { 1.0 } else { -1.0 };
        let prev = self.prev_price.unwrap_or(order.price);
        self.pnl += (order.price - prev) * direction * volume;
        self.prev_price = Some(order.price);

        self.time.push(self.started.elapsed().as_secs_f64());
        self.price.push(order.price);
        self.price_sum += order.price;
        self.moving_avg.push(self.price_sum / self.price.len() as f64);
        self.volume.push(volume);
        self.cum_pnl.push(self.pnl);
        self.latency_us.push(sample.elapsed_us);
        self.throughput.push(sample.throughput);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Seconds since the recorder was created, one per point
    pub fn axis(&self) -> &[f64] {
        &self.time
    }

    /// Cumulative mean of all prices seen so far
    pub fn moving_average(&self) -> &[f64] {
        &self.moving_avg
    }

    /// Running PnL of the alternating long/short position
    pub fn cumulative_pnl(&self) -> &[f64] {
        &self.cum_pnl
    }

    /// All recorded series, in export column order.
    pub fn series(&self) -> [NamedSeries<'_>; 6] {
        [
            NamedSeries::new("Price", &self.price),
            NamedSeries::new("MovingAvg", &self.moving_avg),
            NamedSeries::new("Volume", &self.volume),
            NamedSeries::new("CumPnL", &self.cum_pnl),
            NamedSeries::new("LatencyUs", &self.latency_us),
            NamedSeries::new("Throughput", &self.throughput),
        ]
    }

    /// Export the price series alone.
    pub fn export_prices(&self, sink: &mut dyn ExportSink) -> Result<(), ExportError> {
        sink.export(Self::AXIS, &self.time, &[NamedSeries::new("Price", &self.price)])
    }

    /// Export every series.
    pub fn export_all(&self, sink: &mut dyn ExportSink) -> Result<(), ExportError> {
        sink.export(Self::AXIS, &self.time, &self.series())
    }
}

impl Default for SeriesRecorder {
    fn default() -> Self {
        Self::new()
    }
}
