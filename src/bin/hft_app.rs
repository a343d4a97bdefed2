//! Run the full pipeline: handler -> queue -> engine, then report.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flash_feed::{
    channel, spawn_engine, AppConfig, CoreAffinity, CsvExporter, Engine, FacadeSink, GaugeSink,
    LatencyProbe, MarketDataHandler, MetricsSink, NoPlacement, ProcessingConfig, SeriesRecorder,
    TeeSink, TextSummary, ThreadPlacement,
};

#[derive(Debug, Parser)]
#[command(name = "hft-app", version, about = "Market data ingestion and aggregation pipeline")]
struct Args {
    /// JSON config file; flags given on the command line override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to receive market data on
    #[arg(long)]
    bind: Option<IpAddr>,

    /// UDP port to receive market data on [default: 8080]
    #[arg(short, long)]
    port: Option<u16>,

    /// Stop after this many orders, 0 for no limit [default: 20]
    #[arg(short = 'n', long)]
    max_orders: Option<u64>,

    /// Stop after this many seconds (0 = no limit)
    #[arg(short, long, default_value_t = 0)]
    duration: u64,

    /// Never generate synthetic orders
    #[arg(long)]
    no_synthetic: bool,

    /// Minimum spacing of synthetic orders [default: 100]
    #[arg(long)]
    synthetic_interval_ms: Option<u64>,

    /// Seed for reproducible synthetic orders
    #[arg(long)]
    seed: Option<u64>,

    /// Core for the receive thread [default: 3]
    #[arg(long)]
    receive_core: Option<usize>,

    /// Core for the processing thread [default: 2]
    #[arg(long)]
    process_core: Option<usize>,

    /// Leave both threads unpinned
    #[arg(long)]
    no_pin: bool,

    /// Directory for CSV output
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Skip CSV and summary export
    #[arg(long)]
    no_export: bool,
}

impl Args {
    /// Layer command-line flags over a loaded (or default) config.
    fn apply(&self, config: &mut AppConfig) {
        let handler = &mut config.handler;
        if let Some(bind) = self.bind {
            handler.bind_ip = bind;
        }
        if let Some(port) = self.port {
            handler.port = port;
        }
        if self.no_synthetic {
            handler.synthetic_enabled = false;
        }
        if let Some(interval) = self.synthetic_interval_ms {
            handler.synthetic.interval_ms = interval;
        }
        if self.seed.is_some() {
            handler.synthetic.seed = self.seed;
        }
        if self.receive_core.is_some() {
            handler.core = self.receive_core;
        }

        let processing = &mut config.processing;
        if self.process_core.is_some() {
            processing.core = self.process_core;
        }
        if let Some(max) = self.max_orders {
            processing.max_orders = (max > 0).then_some(max);
        }
        if self.no_export {
            processing.record_series = false;
        }

        if self.no_pin {
            handler.core = None;
            processing.core = None;
        }
    }
}

/// Defaults for a run without a config file.
fn run_defaults() -> AppConfig {
    AppConfig {
        processing: ProcessingConfig {
            max_orders: Some(20),
            record_series: true,
            ..ProcessingConfig::default()
        },
        ..AppConfig::default()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            AppConfig::load(path)?
        }
        None => run_defaults(),
    };
    args.apply(&mut config);
    let AppConfig {
        handler: handler_config,
        processing: processing_config,
    } = config;

    let pinned = handler_config.core.is_some() || processing_config.core.is_some();
    let placement: Arc<dyn ThreadPlacement> = if pinned {
        Arc::new(CoreAffinity)
    } else {
        Arc::new(NoPlacement)
    };
    let gauges = Arc::new(GaugeSink::new());
    let sink: Arc<dyn MetricsSink> = Arc::new(TeeSink::new(vec![
        gauges.clone(),
        Arc::new(FacadeSink::new()),
    ]));

    info!("initializing components");
    let (producer, consumer) = channel();

    let mut handler = MarketDataHandler::new(producer, handler_config)
        .with_placement(Arc::clone(&placement));
    let mode = handler.start().context("starting market data handler")?;
    info!(?mode, "market data handler running");

    let mut engine = Engine::new(LatencyProbe::new(sink));
    if processing_config.record_series {
        engine = engine.with_recorder(SeriesRecorder::with_capacity(1024));
    }

    let running = Arc::new(AtomicBool::new(true));
    let processing = spawn_engine(
        engine,
        consumer,
        Arc::clone(&running),
        processing_config,
        placement,
    )
    .context("spawning processing thread")?;

    let deadline = (args.duration > 0).then(|| Instant::now() + Duration::from_secs(args.duration));
    while !processing.is_finished() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            info!("run duration elapsed");
            break;
        }
        thread::sleep(Duration::from_millis(50));
    }

    running.store(false, Ordering::Release);
    let (mut engine, summary) = processing
        .join()
        .map_err(|_| anyhow!("processing thread panicked"))?;
    let feed = handler.stats();
    handler.stop();

    println!("{}", engine.probe().report());
    println!(
        "Processed {} orders in {:.3}s ({:.2} orders/sec), last latency {:.3} us",
        summary.processed,
        summary.elapsed.as_secs_f64(),
        summary.orders_per_sec(),
        gauges.latency_us()
    );
    println!(
        "Feed: {} packets, {} synthetic, {} receive errors",
        feed.packets(),
        feed.synthetic(),
        feed.recv_errors()
    );

    let snapshot = engine.book().snapshot(5);
    println!("\n{:>12} | {:<12}", "BID", "ASK");
    for i in 0..snapshot.bids.len().max(snapshot.asks.len()) {
        let fmt = |level: Option<&(f64, u64)>| match level {
            Some((price, qty)) => format!("{qty}@{price:.2}"),
            None => String::new(),
        };
        println!("{:>12} | {:<12}", fmt(snapshot.bids.get(i)), fmt(snapshot.asks.get(i)));
    }

    if let Some(recorder) = engine.take_recorder() {
        if recorder.is_empty() {
            warn!("nothing recorded, skipping export");
            return Ok(());
        }
        info!("exporting results");
        std::fs::create_dir_all(&args.out_dir)
            .with_context(|| format!("creating {}", args.out_dir.display()))?;

        recorder.export_prices(&mut CsvExporter::new(args.out_dir.join("price_series.csv")))?;
        recorder.export_all(&mut CsvExporter::new(
            args.out_dir.join("dashboard_timeseries.csv"),
        ))?;
        recorder.export_all(&mut TextSummary::new(std::io::stdout().lock(), "Run Summary"))?;
    }

    Ok(())
}
