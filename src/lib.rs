//! # Flash-Feed
//!
//! A low-latency market data ingestion pipeline: UDP orders in, an
//! aggregated price-level view out, with per-order latency measured on
//! the way.
//!
//! ## Design Principles
//!
//! - **One Hand-off**: The MPSC queue is the only point where threads meet
//! - **Single-Writer Book**: The processing thread owns the order book (no locks)
//! - **Pinned Threads**: Receive and processing threads can each own a core
//! - **Graceful Degradation**: No feed means synthetic orders, not an outage
//!
//! ## Architecture
//!
//! ```text
//! [UDP / Synthetic] --> [Receive Thread] --> [MPSC Queue] --> [Processing Thread]
//!                                                                     |
//!                                                      submit + process_all (timed)
//!                                                                     |
//!                                                  [Order Book]  [Metrics Sink]
//! ```

pub mod order;
pub mod queue;
pub mod pool;
pub mod price_level;
pub mod order_book;
pub mod feed;
pub mod placement;
pub mod metrics;
pub mod instrument;
pub mod engine;
pub mod export;
pub mod generator;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use order::{Order, OrderType, Side, Symbol};
pub use queue::{channel, Consumer, Producer, Queue};
pub use pool::{ObjectPool, Pooled};
pub use price_level::PriceLevel;
pub use order_book::{BookSnapshot, OrderBook};
pub use feed::{MarketDataHandler, StartMode, SyntheticGenerator};
pub use placement::{CoreAffinity, NoPlacement, ThreadPlacement};
pub use self::metrics::{FacadeSink, GaugeSink, MetricsSink, NoopSink, TeeSink};
pub use instrument::{LatencyProbe, LatencyReport, Sample};
pub use engine::{spawn_engine, Engine, RunSummary};
pub use export::{CsvExporter, ExportSink, SeriesRecorder, TextSummary};
pub use generator::MarketDataGenerator;
pub use config::{AppConfig, HandlerConfig, ProcessingConfig, SyntheticConfig};
pub use error::{ConfigError, ExportError, FeedError, MetricsError};
