//! Order-Book Imbalance: the normalised difference between bid and ask
//! visible depth over the top K levels.

use rust_decimal::prelude::ToPrimitive;

use crate::types::MarketData;

#[derive(Debug, Clone, Copy)]
pub struct ObiSignal {
    pub depth: usize,
    pub weighted: bool,
    pub weight: f64,
}

impl ObiSignal {
    pub fn new(depth: usize, weighted: bool, weight: f64) -> Self {
        Self {
            depth,
            weighted,
            weight,
        }
    }

    /// `(Σsize_bids - Σsize_asks) / (Σsize_bids + Σsize_asks)` over the
    /// top `depth` levels of each side. In weighted mode each level `i`
    /// (0-indexed from best) is weighted by `(depth - i)`. Returns 0 if
    /// either side is empty or total volume is 0 — this primitive never
    /// panics on degenerate input.
    pub fn compute(&self, market_data: &MarketData) -> f64 {
        if market_data.bids.is_empty() || market_data.asks.is_empty() {
            return 0.0;
        }

        let bid_sum = level_weighted_sum(&market_data.bids, self.depth, self.weighted);
        let ask_sum = level_weighted_sum(&market_data.asks, self.depth, self.weighted);
        let total = bid_sum + ask_sum;

        if total.abs() < f64::EPSILON {
            return 0.0;
        }

        ((bid_sum - ask_sum) / total).clamp(-1.0, 1.0)
    }
}

fn level_weighted_sum(levels: &[crate::types::Level], depth: usize, weighted: bool) -> f64 {
    let n = depth.min(levels.len());
    let mut total = 0.0;
    for (i, level) in levels.iter().take(n).enumerate() {
        let size = level.size.to_f64().unwrap_or(0.0);
        if weighted {
            total += size * (n - i) as f64;
        } else {
            total += size;
        }
    }
    total
}
