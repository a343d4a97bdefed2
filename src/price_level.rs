//! Price Level - aggregate resting quantity at a single price.
//!
//! The aggregation book keeps no per-order state, so a level is just a
//! running total plus how many orders contributed to it. Both only grow.

/// Aggregate at one price on one side of the book.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PriceLevel {
    /// Total quantity folded into this level
    pub total_qty: u64,
    /// Number of orders folded into this level
    pub count: u32,
}

impl PriceLevel {
    /// Create a new empty price level
    #[inline]
    pub const fn new() -> Self {
        Self {
            total_qty: 0,
            count: 0,
        }
    }

    /// Returns true if nothing has been aggregated yet
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Fold one order's quantity into the level.
    ///
    /// # Complexity
    /// O(1)
    #[inline]
    pub fn add(&mut self, qty: u32) {
        self.total_qty = self.total_qty.saturating_add(qty as u64);
        self.count = self.count.saturating_add(1);
    }
}
