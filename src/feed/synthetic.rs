//! Synthetic order generation for when the real feed is quiet.
//!
//! Prices follow a mean-reverting random walk per symbol:
//!
//! ```text
//! p' = clamp(p + (base - p) * reversion + U(-noise, noise), 50, 150)
//! ```
//!
//! All state that survives between calls (RNG, per-symbol prices, last
//! emission time) lives in the generator value owned by the handler.

use std::time::{Duration, Instant};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::config::SyntheticConfig;
use crate::order::{symbol_from, Order, OrderType, Side, Symbol, DEFAULT_SYMBOL};

/// Lowest price a synthetic order can carry
pub const PRICE_FLOOR: f64 = 50.0;
/// Highest price a synthetic order can carry
pub const PRICE_CEIL: f64 = 150.0;

#[derive(Clone, Debug)]
struct SymbolState {
    symbol: Symbol,
    base: f64,
    current: f64,
}

/// Rate-limited generator of synthetic orders.
#[derive(Debug)]
pub struct SyntheticGenerator {
    rng: ChaCha8Rng,
    symbols: Vec<SymbolState>,
    reversion: f64,
    noise: f64,
    qty_min: u32,
    qty_max: u32,
    interval: Duration,
    last_emit: Option<Instant>,
}

impl SyntheticGenerator {
    /// Build a generator from config, sanitising out-of-range values.
    pub fn new(config: &SyntheticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut symbols: Vec<SymbolState> = config
            .symbols
            .iter()
            .map(|spec| {
                let base = clamp_price(spec.base_price, 100.0);
                SymbolState {
                    symbol: symbol_from(&spec.symbol),
                    base,
                    current: base,
                }
            })
            .collect();
        if symbols.is_empty() {
            symbols.push(SymbolState {
                symbol: symbol_from(DEFAULT_SYMBOL),
                base: 100.0,
                current: 100.0,
            });
        }

        let qty_min = config.qty_min.max(1);
        let qty_max = config.qty_max.max(qty_min);

        Self {
            rng,
            symbols,
            reversion: if config.reversion.is_finite() {
                config.reversion.clamp(0.0, 1.0)
            } else {
                0.0
            },
            noise: if config.noise.is_finite() {
                config.noise.abs().min(PRICE_CEIL - PRICE_FLOOR)
            } else {
                0.0
            },
            qty_min,
            qty_max,
            interval: config.interval(),
            last_emit: None,
        }
    }

    /// Emit an order if at least one interval has passed since the last
    /// emission. The first call always emits.
    pub fn poll(&mut self, now: Instant) -> Option<Order> {
        let due = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if !due {
            return None;
        }
        self.last_emit = Some(now);
        Some(self.next_order())
    }

    /// Generate the next order unconditionally.
    pub fn next_order(&mut self) -> Order {
        let idx = self.rng.gen_range(0..self.symbols.len());
        let noise = if self.noise > 0.0 {
            self.rng.gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };

        let state = &mut self.symbols[idx];
        let step = (state.base - state.current) * self.reversion;
        state.current = clamp_price(state.current + step + noise, state.base);

        let qty = self.rng.gen_range(self.qty_min..=self.qty_max);
        let side = if self.rng.gen_bool(0.5) {
            Side::Buy
        } else {
            Side::Sell
        };

        Order::with_symbol(state.symbol, state.current, qty, side, OrderType::Market)
    }

    /// Latest price generated for `symbol`.
    pub fn current_price(&self, symbol: &str) -> Option<f64> {
        self.symbols
            .iter()
            .find(|s| s.symbol.as_str() == symbol)
            .map(|s| s.current)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[inline]
fn clamp_price(price: f64, fallback: f64) -> f64 {
    if price.is_finite() {
        price.clamp(PRICE_FLOOR, PRICE_CEIL)
    } else {
        fallback.clamp(PRICE_FLOOR, PRICE_CEIL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SymbolSpec;

    fn seeded(seed: u64) -> SyntheticConfig {
        SyntheticConfig {
            seed: Some(seed),
            ..SyntheticConfig::default()
        }
    }

    #[test]
    fn test_prices_stay_in_band() {
        let mut generator = SyntheticGenerator::new(&SyntheticConfig {
            noise: 25.0,
            ..seeded(7)
        });
        for _ in 0..50_000 {
            let order = generator.next_order();
            assert!(
                (PRICE_FLOOR..=PRICE_CEIL).contains(&order.price),
                "price {} escaped the band",
                order.price
            );
        }
    }

    #[test]
    fn test_quantity_in_range() {
        let mut generator = SyntheticGenerator::new(&SyntheticConfig {
            qty_min: 10,
            qty_max: 20,
            ..seeded(1)
        });
        for _ in 0..1_000 {
            let qty = generator.next_order().qty;
            assert!((10..=20).contains(&qty));
        }
    }

    #[test]
    fn test_rate_limit() {
        let mut generator = SyntheticGenerator::new(&SyntheticConfig {
            interval_ms: 100,
            ..seeded(3)
        });
        let t0 = Instant::now();

        assert!(generator.poll(t0).is_some(), "first poll emits");
        assert!(generator.poll(t0).is_none());
        assert!(generator.poll(t0 + Duration::from_millis(99)).is_none());
        assert!(generator.poll(t0 + Duration::from_millis(100)).is_some());
        assert!(generator.poll(t0 + Duration::from_millis(150)).is_none());
        assert!(generator.poll(t0 + Duration::from_millis(200)).is_some());
    }

    #[test]
    fn test_tight_loop_respects_interval() {
        let mut generator = SyntheticGenerator::new(&SyntheticConfig {
            interval_ms: 10,
            ..seeded(4)
        });
        let t0 = Instant::now();
        // 1000 polls spaced 10us apart span 10ms: at most two emissions
        let emitted = (0..1000)
            .filter_map(|i| generator.poll(t0 + Duration::from_micros(i * 10)))
            .count();
        assert!(emitted <= 2, "emitted {emitted}");
    }

    #[test]
    fn test_mean_reversion_without_noise() {
        let mut generator = SyntheticGenerator::new(&SyntheticConfig {
            symbols: vec![SymbolSpec::new("ONE", 120.0)],
            reversion: 0.5,
            noise: 0.0,
            ..seeded(5)
        });
        // With no noise the walk sits on its base
        for _ in 0..10 {
            assert_eq!(generator.next_order().price, 120.0);
        }
        assert_eq!(generator.current_price("ONE"), Some(120.0));
    }

    #[test]
    fn test_base_outside_band_is_clamped() {
        let generator = SyntheticGenerator::new(&SyntheticConfig {
            symbols: vec![SymbolSpec::new("HIGH", 2800.0)],
            ..seeded(6)
        });
        assert_eq!(generator.current_price("HIGH"), Some(PRICE_CEIL));
    }

    #[test]
    fn test_empty_symbol_list_falls_back() {
        let mut generator = SyntheticGenerator::new(&SyntheticConfig {
            symbols: Vec::new(),
            ..seeded(8)
        });
        assert_eq!(generator.next_order().symbol.as_str(), DEFAULT_SYMBOL);
    }

    #[test]
    fn test_huge_noise_is_bounded() {
        let mut generator = SyntheticGenerator::new(&SyntheticConfig {
            noise: f64::MAX,
            ..seeded(9)
        });
        assert_eq!(generator.noise, PRICE_CEIL - PRICE_FLOOR);
        for _ in 0..1_000 {
            let price = generator.next_order().price;
            assert!((PRICE_FLOOR..=PRICE_CEIL).contains(&price));
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SyntheticGenerator::new(&seeded(42));
        let mut b = SyntheticGenerator::new(&seeded(42));
        for _ in 0..100 {
            let (x, y) = (a.next_order(), b.next_order());
            assert_eq!((x.symbol, x.price, x.qty, x.side), (y.symbol, y.price, y.qty, y.side));
        }
    }
}
