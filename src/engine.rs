//! Engine - the processing thread: drain the queue, aggregate, measure.
//!
//! Owns the order book exclusively. Each dequeued order is submitted and
//! aggregated inside a `LatencyProbe::measure` region, so every sample
//! covers exactly one `submit` + `process_all`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::ProcessingConfig;
use crate::export::SeriesRecorder;
use crate::instrument::{LatencyProbe, Sample};
use crate::order::Order;
use crate::order_book::OrderBook;
use crate::placement::{self, ThreadPlacement};
use crate::queue::Consumer;

/// Why and when a `run` ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    /// Orders processed during this run
    pub processed: u64,
    /// Times the backoff fell through to sleeping
    pub idle_sleeps: u64,
    pub elapsed: Duration,
    /// `true` if `max_orders` ended the run rather than the flag
    pub hit_limit: bool,
}

impl RunSummary {
    /// Average orders per second over the whole run
    pub fn orders_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }
}

/// The processing side of the pipeline.
pub struct Engine {
    book: OrderBook,
    probe: LatencyProbe,
    recorder: Option<SeriesRecorder>,
    processed: u64,
}

impl Engine {
    /// Create an engine with an empty book.
    pub fn new(probe: LatencyProbe) -> Self {
        Self {
            book: OrderBook::new(),
            probe,
            recorder: None,
            processed: 0,
        }
    }

    /// Record one series point per processed order.
    pub fn with_recorder(mut self, recorder: SeriesRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Submit one order and aggregate it, timing the whole step.
    ///
    /// This is the main entry point for synchronous usage (testing, benchmarks).
    #[inline]
    pub fn process(&mut self, order: Order) -> Sample {
        let book = &mut self.book;
        let (_, sample) = self.probe.measure(|| {
            book.submit(order);
            book.process_all()
        });

        self.processed += 1;
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(&order, sample);
        }
        sample
    }

    /// Consume orders until `running` clears or `max_orders` is reached.
    ///
    /// An empty queue is polled `spin_iterations` times with a spin hint,
    /// then the thread sleeps for `idle_sleep` before polling again.
    pub fn run(
        &mut self,
        input: &mut Consumer<Order>,
        running: &AtomicBool,
        config: &ProcessingConfig,
    ) -> RunSummary {
        let start = Instant::now();
        let mut processed = 0u64;
        let mut idle_sleeps = 0u64;
        let mut empty_polls = 0u32;
        let mut hit_limit = false;

        info!(max_orders = ?config.max_orders, "processing loop started");

        while running.load(Ordering::Acquire) {
            if config.max_orders.is_some_and(|max| processed >= max) {
                hit_limit = true;
                break;
            }

            match input.dequeue() {
                Some(order) => {
                    self.process(order);
                    processed += 1;
                    empty_polls = 0;
                }
                None if empty_polls < config.spin_iterations => {
                    empty_polls += 1;
                    std::hint::spin_loop();
                }
                None => {
                    idle_sleeps += 1;
                    empty_polls = 0;
                    thread::sleep(config.idle_sleep());
                }
            }
        }

        let summary = RunSummary {
            processed,
            idle_sleeps,
            elapsed: start.elapsed(),
            hit_limit,
        };
        info!(
            processed = summary.processed,
            idle_sleeps = summary.idle_sleeps,
            hit_limit = summary.hit_limit,
            "processing loop stopped"
        );
        summary
    }

    #[inline]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    #[inline]
    pub fn probe(&self) -> &LatencyProbe {
        &self.probe
    }

    pub fn recorder(&self) -> Option<&SeriesRecorder> {
        self.recorder.as_ref()
    }

    /// Take the recorder out, leaving recording off.
    pub fn take_recorder(&mut self) -> Option<SeriesRecorder> {
        self.recorder.take()
    }

    /// Orders processed over the engine's lifetime
    #[inline]
    pub fn processed(&self) -> u64 {
        self.processed
    }

    #[inline]
    pub fn best_bid(&self) -> Option<f64> {
        self.book.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<f64> {
        self.book.best_ask()
    }
}

/// Run `engine` on its own (optionally pinned) thread.
///
/// The thread hands the engine back on join so the caller can read the
/// book and the latency report.
pub fn spawn_engine(
    mut engine: Engine,
    mut input: Consumer<Order>,
    running: Arc<AtomicBool>,
    config: ProcessingConfig,
    placement: Arc<dyn ThreadPlacement>,
) -> std::io::Result<JoinHandle<(Engine, RunSummary)>> {
    thread::Builder::new()
        .name("md-process".into())
        .spawn(move || {
            placement::apply(placement.as_ref(), config.core, "process");
            let summary = engine.run(&mut input, &running, &config);
            debug!(remaining = !input.is_empty(), "processing thread exiting");
            (engine, summary)
        })
}
