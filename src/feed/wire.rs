//! Wire format: one UDP datagram carries one order as ASCII text,
//! `SYMBOL,PRICE,QUANTITY,SIDE`.
//!
//! Parsing never rejects a packet. Each field that is missing or
//! malformed falls back to its own default independently of the others.

use crate::order::{Order, OrderType, Side, DEFAULT_SYMBOL};

/// Largest datagram the receiver reads; anything longer is truncated.
pub const MAX_DATAGRAM: usize = 1500;

/// Price used when the field is absent, non-numeric or not positive.
pub const DEFAULT_PRICE: f64 = 100.0;

/// Quantity used when the field is absent, non-numeric or zero.
pub const DEFAULT_QTY: u32 = 100;

/// Parse a datagram payload into an order.
///
/// - symbol: first token, or [`DEFAULT_SYMBOL`] if there is no token at all
/// - price: finite and > 0, else [`DEFAULT_PRICE`]
/// - quantity: unsigned and > 0, else [`DEFAULT_QTY`]
/// - side: `BUY` exactly, anything else (including absence) is a sell
pub fn parse_order(payload: &[u8]) -> Order {
    let text = String::from_utf8_lossy(payload);
    let mut fields = text.split(',').map(str::trim);

    let symbol = fields
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SYMBOL);

    let price = fields
        .next()
        .and_then(|t| t.parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(DEFAULT_PRICE);

    let qty = fields
        .next()
        .and_then(|t| t.parse::<u32>().ok())
        .filter(|q| *q > 0)
        .unwrap_or(DEFAULT_QTY);

    let side = fields.next().map(Side::from_token).unwrap_or(Side::Sell);

    Order::new(symbol, price, qty, side, OrderType::Market)
}

/// Format an order the way senders put it on the wire (price to 2dp).
pub fn encode(symbol: &str, price: f64, qty: u32, side: Side) -> String {
    format!("{symbol},{price:.2},{qty},{side}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed() {
        let order = parse_order(b"AAPL,101.25,10,BUY");
        assert_eq!(order.symbol.as_str(), "AAPL");
        assert_eq!(order.price, 101.25);
        assert_eq!(order.qty, 10);
        assert_eq!(order.side, Side::Buy);
    }

    #[test]
    fn test_symbol_only() {
        let order = parse_order(b"AAPL");
        assert_eq!(order.symbol.as_str(), "AAPL");
        assert_eq!(order.price, DEFAULT_PRICE);
        assert_eq!(order.qty, DEFAULT_QTY);
        assert_eq!(order.side, Side::Sell);
    }

    #[test]
    fn test_empty_payload() {
        let order = parse_order(b"");
        assert_eq!(order.symbol.as_str(), DEFAULT_SYMBOL);
        assert_eq!(order.price, DEFAULT_PRICE);
        assert_eq!(order.qty, DEFAULT_QTY);
        assert_eq!(order.side, Side::Sell);
    }

    #[test]
    fn test_fields_default_independently() {
        let order = parse_order(b"MSFT,abc,25,BUY");
        assert_eq!(order.price, DEFAULT_PRICE);
        assert_eq!(order.qty, 25);
        assert_eq!(order.side, Side::Buy);

        let order = parse_order(b"MSFT,99.5,-3,SELL");
        assert_eq!(order.price, 99.5);
        assert_eq!(order.qty, DEFAULT_QTY);
        assert_eq!(order.side, Side::Sell);
    }

    #[test]
    fn test_non_positive_and_non_finite_price() {
        assert_eq!(parse_order(b"X,0,1,BUY").price, DEFAULT_PRICE);
        assert_eq!(parse_order(b"X,-5.0,1,BUY").price, DEFAULT_PRICE);
        assert_eq!(parse_order(b"X,NaN,1,BUY").price, DEFAULT_PRICE);
        assert_eq!(parse_order(b"X,inf,1,BUY").price, DEFAULT_PRICE);
    }

    #[test]
    fn test_zero_quantity() {
        assert_eq!(parse_order(b"X,10,0,BUY").qty, DEFAULT_QTY);
    }

    #[test]
    fn test_side_is_literal() {
        assert_eq!(parse_order(b"X,1,1,buy").side, Side::Sell);
        assert_eq!(parse_order(b"X,1,1,HOLD").side, Side::Sell);
        assert_eq!(parse_order(b"X,1,1,BUY\n").side, Side::Buy);
    }

    #[test]
    fn test_empty_symbol_token_defaults() {
        let order = parse_order(b",101,5,BUY");
        assert_eq!(order.symbol.as_str(), DEFAULT_SYMBOL);
        assert_eq!(order.price, 101.0);
    }

    #[test]
    fn test_invalid_utf8_does_not_fail() {
        let order = parse_order(&[0xff, 0xfe, b',', b'5', b'0']);
        assert_eq!(order.price, 50.0);
    }

    #[test]
    fn test_encode_parses_back() {
        let text = encode("NVDA", 450.129, 300, Side::Buy);
        assert_eq!(text, "NVDA,450.13,300,BUY");
        let order = parse_order(text.as_bytes());
        assert_eq!(order.symbol.as_str(), "NVDA");
        assert_eq!(order.price, 450.13);
        assert_eq!(order.side, Side::Buy);
    }
}
