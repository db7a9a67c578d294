//! Slippage estimation (4.F): walks the book to find the volume-weighted
//! execution price for a prospective order size, expressed in bps away
//! from the best price on the relevant side.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::types::{Level, MarketData, OrderSide};

/// Result of a slippage estimate. `bps` is always positive for a worse
/// price, regardless of side; an empty relevant side reports `+inf`
/// and `acceptable = false`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlippageEstimate {
    pub price: Decimal,
    pub bps: f64,
    pub acceptable: bool,
    pub levels_consumed: usize,
}

pub struct SlippageEstimator {
    max_slippage_bps: f64,
}

impl SlippageEstimator {
    pub fn new(max_slippage_bps: f64) -> Self {
        Self { max_slippage_bps }
    }

    /// Walks `levels` consuming up to `size`, accumulating a
    /// volume-weighted average fill price. Stops as soon as the
    /// requested size is filled — `levels_consumed` only counts levels
    /// actually drawn from. If the book doesn't have enough depth to
    /// fill the whole order, the remainder fills at the last level
    /// walked.
    fn walk_book(levels: &[Level], size: Decimal) -> (Decimal, usize) {
        let mut remaining = size;
        let mut notional = Decimal::ZERO;
        let mut filled = Decimal::ZERO;
        let mut levels_consumed = 0;
        let mut last_price = levels[0].price;

        for level in levels {
            if remaining <= Decimal::ZERO {
                break;
            }
            last_price = level.price;
            let take = remaining.min(level.size);
            notional += take * level.price;
            filled += take;
            remaining -= take;
            levels_consumed += 1;
        }

        if remaining > Decimal::ZERO {
            notional += remaining * last_price;
            filled += remaining;
        }

        (notional / filled, levels_consumed)
    }

    /// Estimated slippage for an order of `size` on `side`, relative to
    /// the best price on the relevant side (asks for BUY, bids for
    /// SELL) — not the mid. An empty relevant side is undefined, not
    /// zero: `bps = +inf`, `acceptable = false`, `levels_consumed = 0`.
    pub fn estimate(&self, market_data: &MarketData, side: OrderSide, size: Decimal) -> SlippageEstimate {
        let levels: &[Level] = match side {
            OrderSide::Buy => &market_data.asks,
            OrderSide::Sell => &market_data.bids,
        };
        let Some(reference_price) = levels.first().map(|l| l.price) else {
            return SlippageEstimate {
                price: Decimal::ZERO,
                bps: f64::INFINITY,
                acceptable: false,
                levels_consumed: 0,
            };
        };
        if reference_price.is_zero() || size <= Decimal::ZERO {
            return SlippageEstimate {
                price: Decimal::ZERO,
                bps: f64::INFINITY,
                acceptable: false,
                levels_consumed: 0,
            };
        }

        let (vwap, levels_consumed) = Self::walk_book(levels, size);
        let mut diff = vwap - reference_price;
        if side == OrderSide::Sell {
            diff = -diff;
        }
        let bps = (diff / reference_price).to_f64().unwrap_or(0.0) * 10_000.0;

        SlippageEstimate {
            price: vwap,
            bps,
            acceptable: bps <= self.max_slippage_bps,
            levels_consumed,
        }
    }

    /// Convenience accessor for callers (the cost estimator) that only
    /// need the bps figure, not the full result.
    pub fn estimate_bps(&self, market_data: &MarketData, side: OrderSide, size: Decimal) -> f64 {
        self.estimate(market_data, side, size).bps
    }

    /// Realised slippage between an actual fill and a reference price,
    /// for ex-post reconciliation. Positive means worse than reference,
    /// regardless of side. `+inf` if the reference price is zero.
    pub fn calculate_actual_slippage(
        execution_price: Decimal,
        reference_price: Decimal,
        side: OrderSide,
    ) -> f64 {
        if reference_price.is_zero() {
            return f64::INFINITY;
        }
        let mut diff = execution_price - reference_price;
        if side == OrderSide::Sell {
            diff = -diff;
        }
        (diff / reference_price).to_f64().unwrap_or(0.0) * 10_000.0
    }
}
