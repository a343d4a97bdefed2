//! Order Book - per-price aggregation of incoming quantity by side.
//!
//! Orders are submitted into an internal lock-free queue and folded into
//! their price level in batches by `process_all`. This is a view of
//! resting interest, not a matching engine: bids and asks never cross,
//! and a level's quantity never goes down.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::warn;

use crate::order::{Order, Side};
use crate::price_level::PriceLevel;
use crate::queue::Queue;

/// Ordered map key over finite `f64` prices.
///
/// Uses IEEE total ordering, which agrees with numeric ordering for the
/// finite values the book accepts. `-0.0` is folded into `0.0` so both
/// land on one level.
#[derive(Clone, Copy, Debug)]
struct PriceKey(f64);

impl PriceKey {
    #[inline]
    fn new(price: f64) -> Self {
        Self(price + 0.0)
    }
}

impl PartialEq for PriceKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PriceKey {}

impl PartialOrd for PriceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PriceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Top-of-book view: `(price, total_qty)` pairs, best first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BookSnapshot {
    pub bids: Vec<(f64, u64)>,
    pub asks: Vec<(f64, u64)>,
}

/// Aggregation-only order book.
pub struct OrderBook {
    /// Bid levels, iterated highest price first
    bids: BTreeMap<PriceKey, PriceLevel>,
    /// Ask levels, iterated lowest price first
    asks: BTreeMap<PriceKey, PriceLevel>,
    /// Submitted but not yet aggregated
    inbound: Queue<Order>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            inbound: Queue::new(),
        }
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Queue an order for the next `process_all`. Never fails.
    #[inline]
    pub fn submit(&self, order: Order) {
        self.inbound.enqueue(order);
    }

    /// Aggregate every order queued so far.
    ///
    /// Each order costs O(log L) for L distinct levels on its side.
    ///
    /// # Returns
    /// Number of orders folded into the book
    pub fn process_all(&mut self) -> usize {
        let mut processed = 0;

        while let Some(order) = self.inbound.dequeue() {
            if !order.price.is_finite() {
                warn!(symbol = %order.symbol, price = order.price, "dropping order with non-finite price");
                continue;
            }

            let side = match order.side {
                Side::Buy => &mut self.bids,
                Side::Sell => &mut self.asks,
            };
            side.entry(PriceKey::new(order.price))
                .or_insert_with(PriceLevel::new)
                .add(order.qty);
            processed += 1;
        }

        processed
    }

    /// True when nothing is waiting for `process_all`. Best-effort.
    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.inbound.is_empty()
    }

    // ========================================================================
    // Level Access
    // ========================================================================

    /// Bid levels, highest price first
    pub fn bids(&self) -> impl Iterator<Item = (f64, &PriceLevel)> + '_ {
        self.bids.iter().rev().map(|(k, l)| (k.0, l))
    }

    /// Ask levels, lowest price first
    pub fn asks(&self) -> impl Iterator<Item = (f64, &PriceLevel)> + '_ {
        self.asks.iter().map(|(k, l)| (k.0, l))
    }

    /// Get a price level
    #[inline]
    pub fn level(&self, side: Side, price: f64) -> Option<&PriceLevel> {
        match side {
            Side::Buy => self.bids.get(&PriceKey::new(price)),
            Side::Sell => self.asks.get(&PriceKey::new(price)),
        }
    }

    /// Get the best bid price (highest buy price)
    #[inline]
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.keys().next_back().map(|k| k.0)
    }

    /// Get the best ask price (lowest sell price)
    #[inline]
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.keys().next().map(|k| k.0)
    }

    /// Best ask minus best bid. Negative when the aggregated sides overlap,
    /// which this book allows.
    #[inline]
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Number of distinct bid levels
    #[inline]
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    /// Number of distinct ask levels
    #[inline]
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    /// Total aggregated quantity on one side
    pub fn total_quantity(&self, side: Side) -> u64 {
        let levels = match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        };
        levels.values().map(|l| l.total_qty).sum()
    }

    /// Copy out the best `depth` levels of each side.
    pub fn snapshot(&self, depth: usize) -> BookSnapshot {
        BookSnapshot {
            bids: self.bids().take(depth).map(|(p, l)| (p, l.total_qty)).collect(),
            asks: self.asks().take(depth).map(|(p, l)| (p, l.total_qty)).collect(),
        }
    }

    /// Drop all levels and anything still queued.
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        while self.inbound.dequeue().is_some() {}
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("bid_depth", &self.bid_depth())
            .field("ask_depth", &self.ask_depth())
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .finish()
    }
}
