// =============================================================================
// Order Book Snapshot: top-of-book imbalance
// =============================================================================
//
// imbalance = (bid_volume - ask_volume) / (bid_volume + ask_volume) * 100
//
// Volumes are summed over the top `depth` levels on each side. An empty book
// (both sums zero) has an imbalance of 0, never NaN.
// =============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One price level of the book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub quantity: f64,
}

/// A single order book snapshot, best levels first on both sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    pub fn new(bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> Self {
        Self { bids, asks }
    }

    /// Summed bid volume over the top `depth` levels.
    pub fn bid_volume(&self, depth: usize) -> f64 {
        side_volume(&self.bids, depth)
    }

    /// Summed ask volume over the top `depth` levels.
    pub fn ask_volume(&self, depth: usize) -> f64 {
        side_volume(&self.asks, depth)
    }

    /// Order book imbalance in percent, roughly [-100, 100].
    pub fn imbalance(&self, depth: usize) -> f64 {
        imbalance(self.bid_volume(depth), self.ask_volume(depth))
    }

    /// Keep only the top `depth` levels on each side.
    pub fn truncate(&mut self, depth: usize) {
        self.bids.truncate(depth);
        self.asks.truncate(depth);
    }
}

/// `(bid - ask) / (bid + ask) * 100`, or 0 when the denominator is not
/// positive.
pub fn imbalance(bid_volume: f64, ask_volume: f64) -> f64 {
    let total = bid_volume + ask_volume;
    if total > 0.0 && total.is_finite() {
        (bid_volume - ask_volume) / total * 100.0
    } else {
        0.0
    }
}

fn side_volume(levels: &[BookLevel], depth: usize) -> f64 {
    levels
        .iter()
        .take(depth)
        .map(|l| l.quantity)
        .filter(|q| q.is_finite() && *q > 0.0)
        .sum()
}

/// Parse a Binance depth payload.
///
/// Expected shape:
/// ```json
/// {
///   "lastUpdateId": 12345,
///   "bids": [["37000.00", "1.5"], ...],
///   "asks": [["37001.00", "1.2"], ...]
/// }
/// ```
pub fn parse_depth(root: &serde_json::Value) -> Result<OrderBookSnapshot> {
    let bids = root["bids"].as_array().context("missing field bids")?;
    let asks = root["asks"].as_array().context("missing field asks")?;

    Ok(OrderBookSnapshot {
        bids: parse_levels(bids),
        asks: parse_levels(asks),
    })
}

fn parse_levels(levels: &[serde_json::Value]) -> Vec<BookLevel> {
    levels
        .iter()
        .filter_map(|level| {
            let price = level.get(0)?.as_str()?.parse::<f64>().ok()?;
            let quantity = level.get(1)?.as_str()?.parse::<f64>().ok()?;
            Some(BookLevel { price, quantity })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: f64, quantity: f64) -> BookLevel {
        BookLevel { price, quantity }
    }

    #[test]
    fn empty_book_is_zero() {
        let book = OrderBookSnapshot::default();
        let value = book.imbalance(10);
        assert_eq!(value, 0.0);
        assert!(!value.is_nan());
    }

    #[test]
    fn zero_quantities_are_zero() {
        let book = OrderBookSnapshot::new(vec![level(100.0, 0.0)], vec![level(101.0, 0.0)]);
        assert_eq!(book.imbalance(10), 0.0);
    }

    #[test]
    fn bid_heavy_book_is_positive() {
        let book = OrderBookSnapshot::new(
            vec![level(100.0, 3.0), level(99.0, 1.0)],
            vec![level(101.0, 1.0), level(102.0, 1.0)],
        );
        // (4 - 2) / 6 * 100
        assert!((book.imbalance(10) - 33.333_333_333).abs() < 1e-6);
    }

    #[test]
    fn one_sided_book_hits_the_bounds() {
        let bids_only = OrderBookSnapshot::new(vec![level(100.0, 5.0)], vec![]);
        assert_eq!(bids_only.imbalance(10), 100.0);
        let asks_only = OrderBookSnapshot::new(vec![], vec![level(101.0, 5.0)]);
        assert_eq!(asks_only.imbalance(10), -100.0);
    }

    #[test]
    fn depth_limits_levels() {
        let book = OrderBookSnapshot::new(
            vec![level(100.0, 1.0), level(99.0, 100.0)],
            vec![level(101.0, 1.0), level(102.0, 1.0)],
        );
        assert_eq!(book.imbalance(1), 0.0);
        assert!(book.imbalance(2) > 90.0);
    }

    #[test]
    fn parses_depth_payload() {
        let json = serde_json::json!({
            "lastUpdateId": 1,
            "bids": [["100.5", "2.0"], ["100.0", "1.0"]],
            "asks": [["101.0", "1.5"], ["bad", "1.0"]],
        });
        let book = parse_depth(&json).unwrap();
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.bids[0], level(100.5, 2.0));
    }

    #[test]
    fn parse_depth_requires_both_sides() {
        let json = serde_json::json!({ "bids": [] });
        assert!(parse_depth(&json).is_err());
    }
}
