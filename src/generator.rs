//! Companion market data generator.
//!
//! Produces `SYMBOL,PRICE,QTY,SIDE` text messages for the handler to
//! receive. Each symbol walks around its own base price:
//!
//! ```text
//! p' = clamp(p + (base - p) * 0.001 + U(-0.02, 0.02) * base, base * 0.5, base * 1.5)
//! ```
//!
//! The sending side (socket, pacing) lives in the `market-data-gen` binary.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::feed::wire;
use crate::order::Side;

/// Fraction of the gap to the base price closed per step
pub const MEAN_REVERSION: f64 = 0.001;
/// Per-step move as a fraction of base price
pub const VOLATILITY: f64 = 0.02;
/// Prices stay within this fraction of base, either direction
pub const PRICE_BAND: f64 = 0.5;
pub const QTY_MIN: u32 = 100;
pub const QTY_MAX: u32 = 10_000;

/// Symbols quoted out of the box
pub const DEFAULT_SYMBOLS: [(&str, f64); 8] = [
    ("AAPL", 150.0),
    ("GOOGL", 2800.0),
    ("MSFT", 300.0),
    ("AMZN", 3200.0),
    ("TSLA", 800.0),
    ("META", 320.0),
    ("NVDA", 450.0),
    ("NFLX", 400.0),
];

#[derive(Clone, Copy, Debug)]
struct Quote {
    base: f64,
    current: f64,
}

/// One generated message, before formatting.
#[derive(Clone, Debug, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub qty: u32,
    pub side: Side,
}

impl Tick {
    /// Wire form: `SYMBOL,PRICE(2dp),QTY,SIDE`
    pub fn encode(&self) -> String {
        wire::encode(&self.symbol, self.price, self.qty, self.side)
    }
}

/// Random-walk price source over a set of symbols.
#[derive(Debug)]
pub struct MarketDataGenerator {
    rng: ChaCha8Rng,
    /// Selection order; kept separately so a seed fixes the sequence
    symbols: Vec<String>,
    quotes: FxHashMap<String, Quote>,
}

impl MarketDataGenerator {
    /// Generator over [`DEFAULT_SYMBOLS`], seeded from entropy.
    pub fn new() -> Self {
        Self::with_rng(ChaCha8Rng::from_entropy())
    }

    /// Generator over [`DEFAULT_SYMBOLS`] with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Generator with no symbols.
    pub fn empty(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            symbols: Vec::new(),
            quotes: FxHashMap::default(),
        }
    }

    fn with_rng(rng: ChaCha8Rng) -> Self {
        let mut generator = Self {
            rng,
            symbols: Vec::with_capacity(DEFAULT_SYMBOLS.len()),
            quotes: FxHashMap::default(),
        };
        for (symbol, base) in DEFAULT_SYMBOLS {
            generator.add_symbol(symbol, base);
        }
        generator
    }

    /// Add a symbol, or reset an existing one to a new base price.
    ///
    /// Returns `false` and leaves the generator untouched when the base
    /// price is not finite.
    pub fn add_symbol(&mut self, symbol: &str, base_price: f64) -> bool {
        if !base_price.is_finite() {
            warn!(symbol, base_price, "ignoring symbol with non-finite base price");
            return false;
        }
        let quote = Quote {
            base: base_price,
            current: base_price,
        };
        if self.quotes.insert(symbol.to_string(), quote).is_none() {
            self.symbols.push(symbol.to_string());
        }
        true
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Latest price generated for `symbol`
    pub fn current_price(&self, symbol: &str) -> Option<f64> {
        self.quotes.get(symbol).map(|q| q.current)
    }

    /// Step `symbol`'s walk and return the new price.
    pub fn next_price(&mut self, symbol: &str) -> Option<f64> {
        let shock = self.rng.gen_range(-VOLATILITY..=VOLATILITY);
        let quote = self.quotes.get_mut(symbol)?;

        let reversion = (quote.base - quote.current) * MEAN_REVERSION;
        let price = quote.current + reversion + shock * quote.base;
        let (lo, hi) = (quote.base * (1.0 - PRICE_BAND), quote.base * (1.0 + PRICE_BAND));
        quote.current = price.clamp(lo.min(hi), hi.max(lo));
        Some(quote.current)
    }

    /// Next tick for a randomly chosen symbol. `None` without symbols.
    pub fn next_tick(&mut self) -> Option<Tick> {
        if self.symbols.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.symbols.len());
        let symbol = self.symbols[idx].clone();
        let price = self.next_price(&symbol)?;
        let qty = self.rng.gen_range(QTY_MIN..=QTY_MAX);
        let side = if self.rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };

        Some(Tick {
            symbol,
            price,
            qty,
            side,
        })
    }

    /// Next tick in wire form.
    pub fn next_message(&mut self) -> Option<String> {
        self.next_tick().map(|tick| tick.encode())
    }
}

impl Default for MarketDataGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::wire::parse_order;

    #[test]
    fn test_default_symbols() {
        let generator = MarketDataGenerator::seeded(1);
        assert_eq!(generator.symbols().len(), 8);
        assert_eq!(generator.current_price("GOOGL"), Some(2800.0));
    }

    #[test]
    fn test_prices_stay_in_band() {
        let mut generator = MarketDataGenerator::seeded(9);
        for _ in 0..10_000 {
            let price = generator.next_price("TSLA").unwrap();
            assert!((400.0..=1200.0).contains(&price), "price {price}");
        }
    }

    #[test]
    fn test_unknown_symbol() {
        let mut generator = MarketDataGenerator::seeded(2);
        assert_eq!(generator.next_price("NOPE"), None);
    }

    #[test]
    fn test_empty_generator() {
        let mut generator = MarketDataGenerator::empty(3);
        assert!(generator.next_message().is_none());
        generator.add_symbol("XYZ", 10.0);
        assert!(generator.next_message().unwrap().starts_with("XYZ,"));
    }

    #[test]
    fn test_add_symbol_twice_resets_base() {
        let mut generator = MarketDataGenerator::empty(4);
        generator.add_symbol("XYZ", 10.0);
        generator.add_symbol("XYZ", 20.0);
        assert_eq!(generator.symbols().len(), 1);
        assert_eq!(generator.current_price("XYZ"), Some(20.0));
    }

    #[test]
    fn test_non_finite_base_rejected() {
        let mut generator = MarketDataGenerator::empty(5);
        assert!(!generator.add_symbol("BAD", f64::NAN));
        assert!(!generator.add_symbol("BAD", f64::INFINITY));
        assert!(generator.symbols().is_empty());
        assert!(generator.next_tick().is_none());

        assert!(generator.add_symbol("OK", 50.0));
        assert!(generator.next_price("OK").is_some());
    }

    #[test]
    fn test_message_format_round_trips_through_parser() {
        let mut generator = MarketDataGenerator::seeded(5);
        for _ in 0..100 {
            let tick = generator.next_tick().unwrap();
            let message = tick.encode();
            assert_eq!(message.split(',').count(), 4);

            let order = parse_order(message.as_bytes());
            assert_eq!(order.symbol.as_str(), tick.symbol);
            assert_eq!(order.qty, tick.qty);
            assert_eq!(order.side, tick.side);
            assert!((order.price - tick.price).abs() <= 0.005 + 1e-9);
            assert!((QTY_MIN..=QTY_MAX).contains(&order.qty));
        }
    }

    #[test]
    fn test_same_seed_same_messages() {
        let mut a = MarketDataGenerator::seeded(77);
        let mut b = MarketDataGenerator::seeded(77);
        for _ in 0..50 {
            assert_eq!(a.next_message(), b.next_message());
        }
    }
}
