//! Trade-flow impact: the normalised buy/sell imbalance over a recent
//! time window.

use rust_decimal::prelude::ToPrimitive;

use crate::types::{MarketData, OrderSide};

#[derive(Debug, Clone, Copy)]
pub struct ImpactSignal {
    pub window_ms: i64,
    pub weight: f64,
}

impl ImpactSignal {
    pub fn new(window_ms: i64, weight: f64) -> Self {
        Self { window_ms, weight }
    }

    /// `(Σbuy - Σsell) / (Σbuy + Σsell)` over trades in
    /// `[now - window_ms, now]`. Returns 0 if the window is empty or
    /// total volume is 0.
    pub fn compute(&self, market_data: &MarketData) -> f64 {
        let now = market_data.timestamp_ms;
        let cutoff = now - self.window_ms;

        let mut buy = 0.0;
        let mut sell = 0.0;
        for trade in &market_data.trades {
            if trade.timestamp_ms < cutoff || trade.timestamp_ms > now {
                continue;
            }
            let size = trade.size.to_f64().unwrap_or(0.0);
            match trade.side {
                OrderSide::Buy => buy += size,
                OrderSide::Sell => sell += size,
            }
        }

        let total = buy + sell;
        if total.abs() < f64::EPSILON {
            return 0.0;
        }

        ((buy - sell) / total).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderBookSnapshot, Trade};
    use rust_decimal::Decimal;

    fn md_with_trades(now: i64, trades: Vec<Trade>) -> MarketData {
        let snap = OrderBookSnapshot {
            symbol: "BTC".into(),
            timestamp_ms: now,
            bids: vec![],
            asks: vec![],
            mid_price: Decimal::ZERO,
        };
        MarketData::from_book(&snap, trades)
    }

    fn trade(ts: i64, side: OrderSide, size: f64) -> Trade {
        Trade {
            timestamp_ms: ts,
            price: Decimal::new(100, 0),
            size: Decimal::try_from(size).unwrap(),
            side,
        }
    }

    #[test]
    fn buy_heavy_window_is_positive() {
        let md = md_with_trades(
            10_000,
            vec![
                trade(9_500, OrderSide::Buy, 5.0),
                trade(9_800, OrderSide::Sell, 1.0),
            ],
        );
        let sig = ImpactSignal::new(5_000, 0.25);
        assert!(sig.compute(&md) > 0.0);
    }

    #[test]
    fn trades_outside_window_are_excluded() {
        let md = md_with_trades(
            10_000,
            vec![
                trade(1_000, OrderSide::Buy, 100.0), // outside window
                trade(9_900, OrderSide::Sell, 1.0),
            ],
        );
        let sig = ImpactSignal::new(5_000, 0.25);
        assert!(sig.compute(&md) < 0.0);
    }

    #[test]
    fn empty_window_returns_zero() {
        let md = md_with_trades(10_000, vec![]);
        let sig = ImpactSignal::new(5_000, 0.25);
        assert_eq!(sig.compute(&md), 0.0);
    }
}
