//! Error types.
//!
//! Only setup and egress can fail. An empty queue, an exhausted pool and a
//! malformed packet are ordinary outcomes and never show up here.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Failures starting the market data handler.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The receive endpoint could not be created or bound, and synthetic
    /// fallback is disabled.
    #[error("failed to bind receive endpoint on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The receive thread could not be spawned.
    #[error("failed to spawn receive thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Failures loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures reported by a metrics sink. Never propagated into processing.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics sink unavailable: {0}")]
    Unavailable(String),

    #[error("metrics sink rejected {metric}={value}")]
    Rejected { metric: &'static str, value: f64 },
}

/// Failures writing run results.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("export i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("series `{name}` has {actual} points, axis has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("no series to export")]
    EmptySeries,
}
