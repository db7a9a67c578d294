//! Dynamic cost estimation (4.G): combines a deterministic fee, a
//! book-walk slippage estimate, and a linear market-impact model into a
//! single ex-ante `CostEstimate`, then reconciles it against realised
//! fills to track estimation error over time.

use std::collections::VecDeque;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::execution::slippage::SlippageEstimator;
use crate::types::{CostActual, CostEstimate, MarketData, OrderSide, OrderType};

const IMPACT_DEPTH: usize = 3;
const IMPACT_FLOOR_BPS: f64 = 0.5;
const IMPACT_CEIL_BPS: f64 = 10.0;
const MAX_COST_HISTORY: usize = 10_000;

const ONE_HOUR_MS: i64 = 60 * 60 * 1000;
const ONE_DAY_MS: i64 = 24 * ONE_HOUR_MS;
const ONE_WEEK_MS: i64 = 7 * ONE_DAY_MS;

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowStats {
    pub count: usize,
    pub avg_estimation_error_pct: f64,
    pub avg_actual_total_bps: f64,
}

/// Estimation-accuracy report over every record with a finite error,
/// aggregated across the whole retained history (not windowed).
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimationAccuracy {
    pub avg_error_pct: f64,
    pub error_std: f64,
    pub mae_bps: f64,
    pub rmse_bps: f64,
    pub within_10pct: f64,
    pub within_20pct: f64,
    pub num_samples: usize,
}

pub struct DynamicCostEstimator {
    maker_fee_bps: f64,
    taker_fee_bps: f64,
    impact_alpha: f64,
    slippage: SlippageEstimator,
    history: VecDeque<CostActual>,
}

impl DynamicCostEstimator {
    pub fn new(maker_fee_bps: f64, taker_fee_bps: f64, impact_alpha: f64, max_slippage_bps: f64) -> Self {
        Self {
            maker_fee_bps,
            taker_fee_bps,
            impact_alpha,
            slippage: SlippageEstimator::new(max_slippage_bps),
            history: VecDeque::new(),
        }
    }

    /// Sums the top-`IMPACT_DEPTH` levels of the *relevant* side only —
    /// an order walks liability on its own side of the book, the other
    /// side is irrelevant to how much it moves price.
    fn relevant_side_depth(market_data: &MarketData, side: OrderSide) -> f64 {
        let levels = match side {
            OrderSide::Buy => &market_data.asks,
            OrderSide::Sell => &market_data.bids,
        };
        levels
            .iter()
            .take(IMPACT_DEPTH)
            .map(|l| l.size.to_f64().unwrap_or(0.0))
            .sum()
    }

    /// Sums the top-`IMPACT_DEPTH` levels of *both* sides — liquidity
    /// and volatility scores characterise the book as a whole, not a
    /// single order's path through it.
    fn combined_top_depth(market_data: &MarketData) -> f64 {
        let bid_depth: f64 = market_data
            .bids
            .iter()
            .take(IMPACT_DEPTH)
            .map(|l| l.size.to_f64().unwrap_or(0.0))
            .sum();
        let ask_depth: f64 = market_data
            .asks
            .iter()
            .take(IMPACT_DEPTH)
            .map(|l| l.size.to_f64().unwrap_or(0.0))
            .sum();
        bid_depth + ask_depth
    }

    /// `clamp(alpha * (size / top3_relevant_side) * (1 + (1 -
    /// liquidity_score)) * 10_000, 0.5, 10.0)`. A relevant side with
    /// zero top-3 liquidity skips the ratio entirely (it's undefined)
    /// and returns a flat 5.0 bps.
    fn impact_bps(&self, market_data: &MarketData, side: OrderSide, size: Decimal) -> f64 {
        let depth = Self::relevant_side_depth(market_data, side);
        if depth <= 0.0 {
            return 5.0;
        }
        let size_f = size.to_f64().unwrap_or(0.0);
        let liquidity_score = Self::liquidity_score(market_data);
        let raw = self.impact_alpha * (size_f / depth) * (1.0 + (1.0 - liquidity_score)) * 10_000.0;
        raw.clamp(IMPACT_FLOOR_BPS, IMPACT_CEIL_BPS)
    }

    fn liquidity_score(market_data: &MarketData) -> f64 {
        (Self::combined_top_depth(market_data) / 100.0).min(1.0)
    }

    fn volatility_score(market_data: &MarketData) -> f64 {
        let spread_bps = OrderBookSnapshotSpread::spread_bps_from(market_data).unwrap_or(0.0);
        (spread_bps / 10.0).min(1.0)
    }

    fn fee_bps(&self, order_type: OrderType) -> f64 {
        match order_type {
            OrderType::Limit => self.maker_fee_bps,
            OrderType::Ioc => self.taker_fee_bps,
        }
    }

    pub fn estimate(
        &self,
        market_data: &MarketData,
        side: OrderSide,
        size: Decimal,
        order_type: OrderType,
    ) -> CostEstimate {
        let fee_bps = self.fee_bps(order_type);
        let slippage_bps = self.slippage.estimate_bps(market_data, side, size);
        let impact_bps = self.impact_bps(market_data, side, size);
        let spread_bps = OrderBookSnapshotSpread::spread_bps_from(market_data).unwrap_or(0.0);

        let estimate = CostEstimate {
            fee_bps,
            slippage_bps,
            impact_bps,
            total_bps: fee_bps + slippage_bps + impact_bps,
            spread_bps,
            liquidity_score: Self::liquidity_score(market_data),
            volatility_score: Self::volatility_score(market_data),
        };

        debug!(symbol = %market_data.symbol, ?order_type, total_bps = estimate.total_bps, "cost_estimated");
        estimate
    }

    /// Reconciles a preceding estimate against the realised fill. Fee is
    /// still deterministic by order type; slippage is recomputed from
    /// `actual_fill_price` vs. `reference_price` (the price at signal
    /// time); impact is recomputed from `actual_fill_price` vs.
    /// `best_price` (the top-of-book price at order time) — the two are
    /// usually close but not identical if the signal and the order
    /// weren't simultaneous. Bounds history to `MAX_COST_HISTORY`,
    /// dropping the oldest entry first.
    #[allow(clippy::too_many_arguments)]
    pub fn record_actual(
        &mut self,
        order_id: String,
        symbol: String,
        order_type: OrderType,
        side: OrderSide,
        estimate: CostEstimate,
        actual_fill_price: Decimal,
        reference_price: Decimal,
        best_price: Decimal,
        timestamp_ms: i64,
    ) {
        let actual_fee_bps = self.fee_bps(order_type);
        let actual_slippage_bps =
            SlippageEstimator::calculate_actual_slippage(actual_fill_price, reference_price, side);
        let actual_impact_bps = if best_price.is_zero() {
            0.0
        } else {
            let mut diff = actual_fill_price - best_price;
            if side == OrderSide::Sell {
                diff = -diff;
            }
            (diff / best_price).to_f64().unwrap_or(0.0) * 10_000.0
        };
        let actual_total_bps = actual_fee_bps + actual_slippage_bps + actual_impact_bps;

        let estimation_error_pct = if estimate.total_bps.abs() > f64::EPSILON {
            Some((actual_total_bps - estimate.total_bps) / estimate.total_bps * 100.0)
        } else {
            None
        };

        let actual = CostActual {
            order_id,
            symbol,
            order_type,
            estimate,
            actual_fee_bps,
            actual_slippage_bps,
            actual_impact_bps,
            actual_total_bps,
            estimation_error_pct,
            timestamp_ms,
        };

        if self.history.len() >= MAX_COST_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(actual);
    }

    fn window_stats(&self, now_ms: i64, window_ms: i64, symbol: Option<&str>) -> WindowStats {
        let cutoff = now_ms - window_ms;
        let in_window: Vec<&CostActual> = self
            .history
            .iter()
            .filter(|a| a.timestamp_ms >= cutoff)
            .filter(|a| match symbol {
                Some(s) => a.symbol == s,
                None => true,
            })
            .collect();
        if in_window.is_empty() {
            return WindowStats::default();
        }

        let errors: Vec<f64> = in_window.iter().filter_map(|a| a.estimation_error_pct).collect();
        let avg_error = if errors.is_empty() {
            0.0
        } else {
            errors.iter().sum::<f64>() / errors.len() as f64
        };
        let avg_total = in_window.iter().map(|a| a.actual_total_bps).sum::<f64>() / in_window.len() as f64;

        WindowStats {
            count: in_window.len(),
            avg_estimation_error_pct: avg_error,
            avg_actual_total_bps: avg_total,
        }
    }

    pub fn stats_1h(&self, now_ms: i64, symbol: Option<&str>) -> WindowStats {
        self.window_stats(now_ms, ONE_HOUR_MS, symbol)
    }

    pub fn stats_24h(&self, now_ms: i64, symbol: Option<&str>) -> WindowStats {
        self.window_stats(now_ms, ONE_DAY_MS, symbol)
    }

    pub fn stats_7d(&self, now_ms: i64, symbol: Option<&str>) -> WindowStats {
        self.window_stats(now_ms, ONE_WEEK_MS, symbol)
    }

    /// Aggregate accuracy over the full retained history (not windowed),
    /// restricted to records with a finite estimation error.
    pub fn get_estimation_accuracy(&self) -> EstimationAccuracy {
        let valid: Vec<&CostActual> = self
            .history
            .iter()
            .filter(|a| a.estimation_error_pct.is_some())
            .collect();
        if valid.is_empty() {
            return EstimationAccuracy::default();
        }

        let errors: Vec<f64> = valid.iter().filter_map(|a| a.estimation_error_pct).collect();
        let avg_error = errors.iter().sum::<f64>() / errors.len() as f64;
        let variance = errors.iter().map(|e| (e - avg_error).powi(2)).sum::<f64>() / errors.len() as f64;
        let error_std = variance.sqrt();

        let absolute_errors: Vec<f64> = valid
            .iter()
            .map(|a| (a.actual_total_bps - a.estimate.total_bps).abs())
            .collect();
        let mae_bps = absolute_errors.iter().sum::<f64>() / absolute_errors.len() as f64;

        let squared_errors: Vec<f64> = valid
            .iter()
            .map(|a| (a.actual_total_bps - a.estimate.total_bps).powi(2))
            .collect();
        let rmse_bps = (squared_errors.iter().sum::<f64>() / squared_errors.len() as f64).sqrt();

        let within_10pct = errors.iter().filter(|e| e.abs() < 10.0).count() as f64 / errors.len() as f64;
        let within_20pct = errors.iter().filter(|e| e.abs() < 20.0).count() as f64 / errors.len() as f64;

        EstimationAccuracy {
            avg_error_pct: avg_error,
            error_std,
            mae_bps,
            rmse_bps,
            within_10pct,
            within_20pct,
            num_samples: valid.len(),
        }
    }
}

/// Thin helper kept separate so `estimate()` doesn't duplicate the
/// `OrderBookSnapshot::spread_bps` arithmetic for the `MarketData` shape.
struct OrderBookSnapshotSpread;

impl OrderBookSnapshotSpread {
    fn spread_bps_from(market_data: &MarketData) -> Option<f64> {
        let bid = market_data.best_bid()?;
        let ask = market_data.best_ask()?;
        if market_data.mid_price.is_zero() {
            return None;
        }
        let spread = ask.price - bid.price;
        (spread / market_data.mid_price).to_f64().map(|r| r * 10_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Level, OrderBookSnapshot};

    fn market_data(ask_depth: Decimal, bid_depth: Decimal) -> MarketData {
        let snap = OrderBookSnapshot {
            symbol: "BTC".into(),
            timestamp_ms: 0,
            bids: vec![Level::new(Decimal::new(29990, 1), bid_depth)],
            asks: vec![Level::new(Decimal::new(30010, 1), ask_depth)],
            mid_price: Decimal::new(30000, 1),
        };
        MarketData::from_book(&snap, vec![])
    }

    fn estimator() -> DynamicCostEstimator {
        DynamicCostEstimator::new(0.015, 0.045, 0.01, 20.0)
    }

    #[test]
    fn taker_fee_exceeds_maker_fee() {
        let estimator = estimator();
        let md = market_data(Decimal::new(100, 0), Decimal::new(100, 0));
        let maker = estimator.estimate(&md, OrderSide::Buy, Decimal::ONE, OrderType::Limit);
        let taker = estimator.estimate(&md, OrderSide::Buy, Decimal::ONE, OrderType::Ioc);
        assert!(taker.fee_bps > maker.fee_bps);
    }

    #[test]
    fn impact_is_clamped_to_band() {
        let estimator = estimator();
        let thin = market_data(Decimal::new(1, 1), Decimal::new(100, 0));
        let est = estimator.estimate(&thin, OrderSide::Buy, Decimal::new(1000, 0), OrderType::Ioc);
        assert!((IMPACT_FLOOR_BPS..=IMPACT_CEIL_BPS).contains(&est.impact_bps));

        let deep = market_data(Decimal::new(10_000, 0), Decimal::new(100, 0));
        let est2 = estimator.estimate(&deep, OrderSide::Buy, Decimal::new(1, 1), OrderType::Ioc);
        assert!((IMPACT_FLOOR_BPS..=IMPACT_CEIL_BPS).contains(&est2.impact_bps));
    }

    #[test]
    fn record_and_window_stats_roundtrip() {
        let mut estimator = estimator();
        let md = market_data(Decimal::new(100, 0), Decimal::new(100, 0));
        let est = estimator.estimate(&md, OrderSide::Buy, Decimal::ONE, OrderType::Ioc);
        estimator.record_actual(
            "o1".into(),
            "BTC".into(),
            OrderType::Ioc,
            OrderSide::Buy,
            est,
            Decimal::new(30012, 1),
            Decimal::new(30010, 1),
            Decimal::new(30010, 1),
            1_000,
        );
        let stats = estimator.stats_1h(2_000, None);
        assert_eq!(stats.count, 1);
    }

    #[test]
    fn stale_records_fall_out_of_window() {
        let mut estimator = estimator();
        let md = market_data(Decimal::new(100, 0), Decimal::new(100, 0));
        let est = estimator.estimate(&md, OrderSide::Buy, Decimal::ONE, OrderType::Ioc);
        estimator.record_actual(
            "o1".into(),
            "BTC".into(),
            OrderType::Ioc,
            OrderSide::Buy,
            est,
            Decimal::new(30010, 1),
            Decimal::new(30010, 1),
            Decimal::new(30010, 1),
            0,
        );
        let stats = estimator.stats_1h(ONE_HOUR_MS + 1_000, None);
        assert_eq!(stats.count, 0);
    }

    #[test]
    fn window_stats_respect_symbol_filter() {
        let mut estimator = estimator();
        let md = market_data(Decimal::new(100, 0), Decimal::new(100, 0));
        let est = estimator.estimate(&md, OrderSide::Buy, Decimal::ONE, OrderType::Ioc);
        estimator.record_actual(
            "o1".into(),
            "BTC".into(),
            OrderType::Ioc,
            OrderSide::Buy,
            est,
            Decimal::new(30010, 1),
            Decimal::new(30010, 1),
            Decimal::new(30010, 1),
            1_000,
        );
        estimator.record_actual(
            "o2".into(),
            "ETH".into(),
            OrderType::Ioc,
            OrderSide::Buy,
            est,
            Decimal::new(30010, 1),
            Decimal::new(30010, 1),
            Decimal::new(30010, 1),
            1_000,
        );
        assert_eq!(estimator.stats_1h(2_000, Some("BTC")).count, 1);
        assert_eq!(estimator.stats_1h(2_000, None).count, 2);
    }

    #[test]
    fn actual_cost_reflects_a_genuinely_worse_fill() {
        let mut estimator = estimator();
        let md = market_data(Decimal::new(100, 0), Decimal::new(100, 0));
        let est = estimator.estimate(&md, OrderSide::Buy, Decimal::ONE, OrderType::Ioc);
        // Filled well above both the reference and best price: actual
        // slippage/impact must come out positive, not mirror the estimate.
        estimator.record_actual(
            "o1".into(),
            "BTC".into(),
            OrderType::Ioc,
            OrderSide::Buy,
            est,
            Decimal::new(30100, 1),
            Decimal::new(30010, 1),
            Decimal::new(30010, 1),
            1_000,
        );
        let actual = &estimator.history[0];
        assert!(actual.actual_slippage_bps > 0.0);
        assert!(actual.actual_impact_bps > 0.0);
        assert_ne!(actual.actual_total_bps, est.total_bps);
    }

    #[test]
    fn estimation_accuracy_aggregates_over_history() {
        let mut estimator = estimator();
        let md = market_data(Decimal::new(100, 0), Decimal::new(100, 0));
        let est = estimator.estimate(&md, OrderSide::Buy, Decimal::ONE, OrderType::Ioc);
        for i in 0..5 {
            estimator.record_actual(
                format!("o{i}"),
                "BTC".into(),
                OrderType::Ioc,
                OrderSide::Buy,
                est,
                Decimal::new(30010, 1),
                Decimal::new(30010, 1),
                Decimal::new(30010, 1),
                i,
            );
        }
        let accuracy = estimator.get_estimation_accuracy();
        assert_eq!(accuracy.num_samples, 5);
        assert!(accuracy.within_20pct >= accuracy.within_10pct);
    }
}
