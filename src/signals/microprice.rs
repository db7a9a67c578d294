//! Microprice: a size-weighted mid price, a better unbiased estimator of
//! the next trade's price than the arithmetic mid.

use rust_decimal::prelude::ToPrimitive;

use crate::types::MarketData;

#[derive(Debug, Clone, Copy)]
pub struct MicropriceSignal {
    pub scale: f64,
    pub weight: f64,
}

impl MicropriceSignal {
    pub fn new(scale: f64, weight: f64) -> Self {
        Self { scale, weight }
    }

    /// `mp = (best_bid*ask_size + best_ask*bid_size) / (bid_size + ask_size)`,
    /// mapped to `((mp - mid) / mid) * scale`, clamped to `[-1, 1]`.
    /// Returns 0 if either side is empty, total size is 0, or mid is 0.
    pub fn compute(&self, market_data: &MarketData) -> f64 {
        let (Some(bid), Some(ask)) = (market_data.best_bid(), market_data.best_ask()) else {
            return 0.0;
        };

        let bid_price = bid.price.to_f64().unwrap_or(0.0);
        let ask_price = ask.price.to_f64().unwrap_or(0.0);
        let bid_size = bid.size.to_f64().unwrap_or(0.0);
        let ask_size = ask.size.to_f64().unwrap_or(0.0);
        let total_size = bid_size + ask_size;

        if total_size.abs() < f64::EPSILON {
            return 0.0;
        }

        let mid = market_data.mid_price.to_f64().unwrap_or(0.0);
        if mid.abs() < f64::EPSILON {
            return 0.0;
        }

        let microprice = (bid_price * ask_size + ask_price * bid_size) / total_size;
        (((microprice - mid) / mid) * self.scale).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Level, OrderBookSnapshot};
    use rust_decimal::Decimal;

    fn md(bid_price: f64, ask_price: f64, bid_size: f64, ask_size: f64) -> MarketData {
        let snap = OrderBookSnapshot {
            symbol: "BTC".into(),
            timestamp_ms: 0,
            bids: vec![Level::new(
                Decimal::try_from(bid_price).unwrap(),
                Decimal::try_from(bid_size).unwrap(),
            )],
            asks: vec![Level::new(
                Decimal::try_from(ask_price).unwrap(),
                Decimal::try_from(ask_size).unwrap(),
            )],
            mid_price: Decimal::try_from((bid_price + ask_price) / 2.0).unwrap(),
        };
        MarketData::from_book(&snap, vec![])
    }

    #[test]
    fn bid_heavy_signal_is_negative() {
        let data = md(3000.0, 3000.5, 5.0, 50.0);
        let sig = MicropriceSignal::new(100.0, 0.35);
        let value = sig.compute(&data);
        assert!(value < 0.0, "expected negative signal, got {value}");
        assert!((-0.02..0.0).contains(&value));
    }

    #[test]
    fn empty_side_returns_zero() {
        let snap = OrderBookSnapshot {
            symbol: "BTC".into(),
            timestamp_ms: 0,
            bids: vec![],
            asks: vec![],
            mid_price: Decimal::ZERO,
        };
        let data = MarketData::from_book(&snap, vec![]);
        let sig = MicropriceSignal::new(100.0, 0.35);
        assert_eq!(sig.compute(&data), 0.0);
    }
}
