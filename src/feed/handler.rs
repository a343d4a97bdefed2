//! Market Data Handler - owns the receive thread.
//!
//! ```text
//!            start()                      stop()
//! Stopped ------------> Running ---------------------> Stopped
//!            (bind, spawn pinned thread)  (clear flag, join, drop endpoint)
//! ```
//!
//! The receive thread makes one non-blocking receive attempt per
//! iteration. A packet is parsed leniently and enqueued; no packet lets
//! the synthetic generator emit if its interval has elapsed. Either way
//! the thread then sleeps for the poll interval and re-checks the
//! running flag.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use crate::config::HandlerConfig;
use crate::error::FeedError;
use crate::feed::synthetic::SyntheticGenerator;
use crate::feed::transport::{DatagramTransport, TransportBinder, UdpBinder};
use crate::feed::wire::{self, MAX_DATAGRAM};
use crate::order::Order;
use crate::placement::{self, CoreAffinity, ThreadPlacement};
use crate::queue::Producer;

/// Lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerState {
    Stopped,
    Running,
}

/// How a successful `start` is feeding the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartMode {
    /// Receiving on this address (plus synthetic fill-in if enabled)
    Live(SocketAddr),
    /// Binding failed; synthetic orders only
    Synthetic,
    /// Was already running; nothing changed
    AlreadyRunning,
}

/// Counters shared with the receive thread.
#[derive(Debug, Default)]
pub struct FeedStats {
    packets: AtomicU64,
    synthetic: AtomicU64,
    recv_errors: AtomicU64,
}

impl FeedStats {
    /// Datagrams received and enqueued
    pub fn packets(&self) -> u64 {
        self.packets.load(Ordering::Relaxed)
    }

    /// Synthetic orders enqueued
    pub fn synthetic(&self) -> u64 {
        self.synthetic.load(Ordering::Relaxed)
    }

    /// Receive calls that failed with something other than "no data"
    pub fn recv_errors(&self) -> u64 {
        self.recv_errors.load(Ordering::Relaxed)
    }

    /// All orders enqueued by the handler
    pub fn orders(&self) -> u64 {
        self.packets() + self.synthetic()
    }
}

/// Receives market data on a pinned thread and pushes orders downstream.
pub struct MarketDataHandler {
    config: HandlerConfig,
    producer: Producer<Order>,
    binder: Arc<dyn TransportBinder>,
    placement: Arc<dyn ThreadPlacement>,
    running: Arc<AtomicBool>,
    stats: Arc<FeedStats>,
    thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl MarketDataHandler {
    /// Create a stopped handler using UDP and OS core pinning.
    pub fn new(producer: Producer<Order>, config: HandlerConfig) -> Self {
        Self {
            config,
            producer,
            binder: Arc::new(UdpBinder),
            placement: Arc::new(CoreAffinity),
            running: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(FeedStats::default()),
            thread: None,
            local_addr: None,
        }
    }

    /// Use a different transport backend
    pub fn with_binder(mut self, binder: Arc<dyn TransportBinder>) -> Self {
        self.binder = binder;
        self
    }

    /// Use a different thread placement backend
    pub fn with_placement(mut self, placement: Arc<dyn ThreadPlacement>) -> Self {
        self.placement = placement;
        self
    }

    /// Bind the endpoint and spawn the receive thread.
    ///
    /// If binding fails the handler continues on synthetic data when that
    /// is enabled, and fails without spawning anything otherwise.
    /// Calling `start` on a running handler is a no-op. A receive thread
    /// that died is reaped first, so the handler can start again.
    pub fn start(&mut self) -> Result<StartMode, FeedError> {
        if self.thread.as_ref().is_some_and(JoinHandle::is_finished) {
            warn!("receive thread exited unexpectedly, restarting");
            self.stop();
        }
        if self.thread.is_some() {
            debug!("market data handler already running");
            return Ok(StartMode::AlreadyRunning);
        }

        let addr = self.config.bind_addr();
        let transport = match self.binder.bind(addr) {
            Ok(transport) => Some(transport),
            Err(source) if self.config.synthetic_enabled => {
                warn!(%addr, error = %source, "bind failed, continuing on synthetic data only");
                None
            }
            Err(source) => {
                error!(%addr, error = %source, "bind failed and synthetic fallback is disabled");
                return Err(FeedError::Bind { addr, source });
            }
        };

        let mode = match &transport {
            Some(t) => StartMode::Live(t.local_addr().unwrap_or(addr)),
            None => StartMode::Synthetic,
        };

        let receive_loop = ReceiveLoop {
            transport,
            generator: self
                .config
                .synthetic_enabled
                .then(|| SyntheticGenerator::new(&self.config.synthetic)),
            producer: self.producer.clone(),
            running: Arc::clone(&self.running),
            stats: Arc::clone(&self.stats),
            poll_interval: self.config.poll_interval(),
        };
        let placement = Arc::clone(&self.placement);
        let core = self.config.core;

        self.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name("md-receive".into())
            .spawn(move || {
                placement::apply(placement.as_ref(), core, "receive");
                receive_loop.run();
            });

        match spawned {
            Ok(handle) => self.thread = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                error!(error = %e, "failed to spawn receive thread");
                return Err(FeedError::Spawn(e));
            }
        }

        self.local_addr = match mode {
            StartMode::Live(bound) => Some(bound),
            _ => None,
        };
        info!(?mode, synthetic = self.config.synthetic_enabled, "market data handler started");
        Ok(mode)
    }

    /// Stop the receive thread and release the endpoint. Idempotent.
    pub fn stop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        if handle.join().is_err() {
            error!("receive thread panicked");
        }
        self.local_addr = None;

        info!(
            packets = self.stats.packets(),
            synthetic = self.stats.synthetic(),
            recv_errors = self.stats.recv_errors(),
            "market data handler stopped"
        );
    }

    /// Running only while the receive thread is alive. A thread that
    /// exited on its own (a panic) reports Stopped; `stop` still reaps it.
    #[inline]
    pub fn state(&self) -> HandlerState {
        if self.thread.as_ref().is_some_and(|t| !t.is_finished()) {
            HandlerState::Running
        } else {
            HandlerState::Stopped
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state() == HandlerState::Running
    }

    /// Bound receive address while running live
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Shared counters, readable from any thread
    pub fn stats(&self) -> Arc<FeedStats> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }
}

impl Drop for MarketDataHandler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for MarketDataHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketDataHandler")
            .field("state", &self.state())
            .field("local_addr", &self.local_addr)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Everything the receive thread owns.
struct ReceiveLoop {
    transport: Option<Box<dyn DatagramTransport>>,
    generator: Option<SyntheticGenerator>,
    producer: Producer<Order>,
    running: Arc<AtomicBool>,
    stats: Arc<FeedStats>,
    poll_interval: Duration,
}

impl ReceiveLoop {
    fn run(mut self) {
        let mut buf = [0u8; MAX_DATAGRAM];

        while self.running.load(Ordering::Acquire) {
            match self.try_receive(&mut buf) {
                Some(len) => {
                    let order = wire::parse_order(&buf[..len]);
                    trace!(symbol = %order.symbol, price = order.price, qty = order.qty, "packet");
                    self.stats.packets.fetch_add(1, Ordering::Relaxed);
                    self.producer.enqueue(order);
                }
                None => {
                    if let Some(generator) = self.generator.as_mut() {
                        if let Some(order) = generator.poll(Instant::now()) {
                            trace!(symbol = %order.symbol, price = order.price, "synthetic");
                            self.stats.synthetic.fetch_add(1, Ordering::Relaxed);
                            self.producer.enqueue(order);
                        }
                    }
                }
            }

            thread::sleep(self.poll_interval);
        }
        // Endpoint is dropped with `self`
    }

    fn try_receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        let transport = self.transport.as_mut()?;
        match transport.try_recv(buf) {
            Ok(received) => received,
            Err(e) => {
                let errors = self.stats.recv_errors.fetch_add(1, Ordering::Relaxed) + 1;
                if errors == 1 || errors % 1000 == 0 {
                    warn!(error = %e, errors, "receive failed");
                }
                None
            }
        }
    }
}
