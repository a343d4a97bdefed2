//! Order types flowing through the ingestion pipeline.
//!
//! An `Order` is created once (parsed from the wire or synthesized),
//! moved through the queues by value, and folded into a price level.
//! Nothing keeps an order's identity after aggregation.

use std::fmt;
use std::time::Instant;

use arrayvec::ArrayString;

/// Maximum symbol length in bytes.
pub const SYMBOL_CAPACITY: usize = 16;

/// Bounded, stack-allocated ticker symbol.
pub type Symbol = ArrayString<SYMBOL_CAPACITY>;

/// Symbol used when a packet carries no symbol token at all.
pub const DEFAULT_SYMBOL: &str = "DEFAULT";

/// Build a symbol from arbitrary text, truncating on a char boundary.
pub fn symbol_from(text: &str) -> Symbol {
    let mut end = text.len().min(SYMBOL_CAPACITY);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    // `end` fits by construction
    ArrayString::from(&text[..end]).unwrap_or_default()
}

/// Order side
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Buy = 0,
    /// Sell side (asks)
    Sell = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Interpret a wire token. Only the literal `BUY` is a buy.
    #[inline]
    pub fn from_token(token: &str) -> Self {
        if token == "BUY" {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    /// Wire representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type carried for downstream consumers. The aggregation book
/// treats all types alike.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OrderType {
    #[default]
    Market = 0,
    Limit = 1,
    Stop = 2,
    StopLimit = 3,
}

/// One trade intent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Order {
    pub symbol: Symbol,
    /// Always finite once the order has left ingestion
    pub price: f64,
    pub qty: u32,
    pub side: Side,
    pub order_type: OrderType,
    /// Monotonic creation time
    pub created_at: Instant,
}

impl Order {
    /// Create an order stamped with the current monotonic time.
    #[inline]
    pub fn new(symbol: &str, price: f64, qty: u32, side: Side, order_type: OrderType) -> Self {
        Self::with_symbol(symbol_from(symbol), price, qty, side, order_type)
    }

    /// Same as `new` for an already bounded symbol.
    #[inline]
    pub fn with_symbol(
        symbol: Symbol,
        price: f64,
        qty: u32,
        side: Side,
        order_type: OrderType,
    ) -> Self {
        Self {
            symbol,
            price,
            qty,
            side,
            order_type,
            created_at: Instant::now(),
        }
    }

    /// Time spent since the order was created.
    #[inline]
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOL, 0.0, 0, Side::Buy, OrderType::Market)
    }
}
