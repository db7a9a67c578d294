//! Per-symbol order book: top-N depth maintained from snapshot updates.

use rust_decimal::Decimal;
use tracing::warn;

use crate::types::{Level, OrderBookSnapshot};

/// Raw snapshot-style update as delivered by the feed adapter, before
/// it has been validated into an `OrderBookSnapshot`.
#[derive(Debug, Clone, Default)]
pub struct RawLevels {
    pub bids: Vec<(String, String)>,
    pub asks: Vec<(String, String)>,
}

pub struct OrderBook {
    symbol: String,
    depth: usize,
    bids: Vec<Level>,
    asks: Vec<Level>,
    last_update_ms: i64,
    error_count: u64,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>, depth: usize) -> Self {
        Self {
            symbol: symbol.into(),
            depth,
            bids: Vec::new(),
            asks: Vec::new(),
            last_update_ms: 0,
            error_count: 0,
        }
    }

    /// Replaces the book with up to `depth` levels from a snapshot-style
    /// update. On malformed input (unparsable decimals) the prior state
    /// is preserved and the error counter incremented. The recorded
    /// timestamp is always the caller-supplied local receive time, never
    /// a venue timestamp, so downstream latency measurements share a
    /// single clock origin.
    pub fn apply_snapshot(&mut self, raw: &RawLevels, receive_time_ms: i64) {
        let bids = match parse_levels(&raw.bids, self.depth) {
            Some(levels) => levels,
            None => {
                self.error_count += 1;
                warn!(symbol = %self.symbol, "order_book_malformed_bids");
                return;
            }
        };
        let asks = match parse_levels(&raw.asks, self.depth) {
            Some(levels) => levels,
            None => {
                self.error_count += 1;
                warn!(symbol = %self.symbol, "order_book_malformed_asks");
                return;
            }
        };

        self.bids = bids;
        self.asks = asks;
        self.last_update_ms = receive_time_ms;
    }

    pub fn is_valid(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }

    pub fn mid_price(&self) -> Decimal {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => (b.price + a.price) / Decimal::TWO,
            _ => Decimal::ZERO,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(a.price - b.price),
            _ => None,
        }
    }

    pub fn spread_bps(&self) -> Option<f64> {
        let spread = self.spread()?;
        let mid = self.mid_price();
        if mid.is_zero() {
            return None;
        }
        (spread / mid * Decimal::new(10_000, 0))
            .to_string()
            .parse()
            .ok()
    }

    pub fn depth(&self, k: usize) -> (&[Level], &[Level]) {
        let bid_n = k.min(self.bids.len());
        let ask_n = k.min(self.asks.len());
        (&self.bids[..bid_n], &self.asks[..ask_n])
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn snapshot(&self) -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            timestamp_ms: self.last_update_ms,
            bids: self.bids.clone(),
            asks: self.asks.clone(),
            mid_price: self.mid_price(),
        }
    }
}

fn parse_levels(raw: &[(String, String)], depth: usize) -> Option<Vec<Level>> {
    let mut levels = Vec::with_capacity(raw.len().min(depth));
    for (price_str, size_str) in raw.iter().take(depth) {
        let price: Decimal = price_str.parse().ok()?;
        let size: Decimal = size_str.parse().ok()?;
        if size < Decimal::ZERO {
            return None;
        }
        levels.push(Level::new(price, size));
    }
    Some(levels)
}
