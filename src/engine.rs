//! The trading engine (4.P): wires every other component together under
//! a fixed-tick cooperative schedule.
//!
//! `FETCH_DATA → SIGNAL → ROUTE → APPLY_FILL → POSITION_CHECK → SLEEP`,
//! per symbol, every tick. A failure on one symbol is logged and the
//! loop moves to the next symbol or the next tick — one bad instrument
//! never stops the engine. A process-wide stop flag, checked once per
//! tick, lets the current tick finish (including position finalisation)
//! before the loop exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::attribution::PnlAttributor;
use crate::config::EngineConfig;
use crate::execution::adapter::ExecutionAdapter;
use crate::execution::{DynamicCostEstimator, IocExecutor, OrderRouter, RouterConfig, SignalDeduplicator, SlippageEstimator};
use crate::market_data::MarketDataManager;
use crate::risk::{CloseTrigger, HardLimits, PositionCloser, PositionManager, TpSlManager, TpSlOutcome};
use crate::signals::SignalAggregator;
use crate::types::{MarketData, OrderSide, OrderStatus};

#[derive(Debug, Clone, Default)]
pub struct EngineStopFlag(Arc<AtomicBool>);

impl EngineStopFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct TradingEngine {
    config: EngineConfig,
    market_data: MarketDataManager,
    aggregator: SignalAggregator,
    dedup: SignalDeduplicator,
    slippage: SlippageEstimator,
    router: OrderRouter,
    cost_estimator: DynamicCostEstimator,
    attributor: PnlAttributor,
    positions: PositionManager,
    tp_sl: TpSlManager,
    closer: PositionCloser,
    hard_limits: HardLimits,
    /// Sized fresh per close, since a closing IOC order's size is the
    /// position's exact size, not the router's fixed configured size.
    close_cross_buffer_bps: Decimal,
    current_nav: Decimal,
    stop_flag: EngineStopFlag,
}

impl TradingEngine {
    pub fn new(config: EngineConfig, market_data: MarketDataManager, stop_flag: EngineStopFlag) -> Self {
        let aggregator = SignalAggregator::new(&config);
        let dedup = SignalDeduplicator::new(
            config.dedup_cooldown_sec,
            config.dedup_change_threshold,
            config.dedup_max_same_direction,
            config.dedup_decay_factor,
        );
        let close_cross_buffer_bps = Decimal::try_from(config.ioc_adj_bps).unwrap_or(Decimal::ZERO);
        let router = OrderRouter::new(RouterConfig {
            ioc_size: config.ioc_default_size,
            maker_size: config.maker_default_size,
            high_maker_timeout_ms: (config.maker_timeout_high_sec * 1000.0) as u64,
            medium_maker_timeout_ms: (config.maker_timeout_medium_sec * 1000.0) as u64,
            poll_interval_ms: config.maker_poll_interval_ms,
            cross_buffer_bps: close_cross_buffer_bps,
            maker_tick_offset: config.maker_tick_offset,
            enable_fallback: config.router_enable_fallback,
            fallback_on_medium: config.router_fallback_on_medium,
        });
        let maker_fee_bps = decimal_to_bps(config.maker_fee_rate);
        let taker_fee_bps = decimal_to_bps(config.taker_fee_rate);
        let cost_estimator =
            DynamicCostEstimator::new(maker_fee_bps, taker_fee_bps, config.impact_alpha, config.max_slippage_bps);
        let slippage = SlippageEstimator::new(config.max_slippage_bps);
        let attributor = PnlAttributor::new(config.alpha_horizon_factor, config.maker_rebate_bps, config.alpha_threshold_pct);
        let tp_sl = TpSlManager::new(config.take_profit_pct, config.stop_loss_pct);
        let closer = PositionCloser::new(config.max_position_age_seconds);
        let hard_limits = HardLimits::new(
            config.initial_nav,
            config.max_single_loss_pct,
            config.max_daily_drawdown_pct,
            config.max_position_size_usd,
            config.fallback_slippage_pct,
        );
        let current_nav = config.initial_nav;

        Self {
            config,
            market_data,
            aggregator,
            dedup,
            slippage,
            router,
            cost_estimator,
            attributor,
            positions: PositionManager::new(),
            tp_sl,
            closer,
            hard_limits,
            close_cross_buffer_bps,
            current_nav,
            stop_flag,
        }
    }

    pub fn market_data_mut(&mut self) -> &mut MarketDataManager {
        &mut self.market_data
    }

    /// Current position for `symbol`, flat if never traded. Exposed for
    /// callers (tests, future reporting surfaces) that need to observe
    /// engine state without reaching into its private fields.
    pub fn position_snapshot(&self, symbol: &str) -> crate::types::Position {
        self.positions.get(symbol)
    }

    pub async fn run(&mut self, adapter: &dyn ExecutionAdapter, now_ms: impl Fn() -> i64) {
        loop {
            if self.stop_flag.is_stopped() {
                info!("engine_stop_flag_observed");
                break;
            }
            let tick_start = now_ms();
            self.run_tick(adapter, tick_start).await;
            sleep(Duration::from_millis(self.config.tick_period_ms)).await;
        }
    }

    /// One full tick across every configured symbol, followed by the
    /// position-closer sweep. Symbols are processed in configured
    /// order, deterministically.
    pub async fn run_tick(&mut self, adapter: &dyn ExecutionAdapter, now_ms: i64) {
        let symbols = self.config.symbols.clone();
        for symbol in &symbols {
            if let Err(reason) = self.process_symbol(adapter, symbol, now_ms).await {
                warn!(symbol, reason, "tick_symbol_failed");
            }
        }
        self.run_position_closer_sweep(adapter, now_ms).await;
    }

    /// Best price on the side an order of `side` would execute against
    /// (asks for BUY, bids for SELL) — used both as the slippage
    /// reference price at signal time and, refetched after routing, as
    /// the impact reference price at order time.
    fn touch_for(market_data: &MarketData, side: OrderSide) -> Decimal {
        match side {
            OrderSide::Buy => market_data.best_ask().map(|l| l.price),
            OrderSide::Sell => market_data.best_bid().map(|l| l.price),
        }
        .unwrap_or(market_data.mid_price)
    }

    async fn process_symbol(
        &mut self,
        adapter: &dyn ExecutionAdapter,
        symbol: &str,
        now_ms: i64,
    ) -> Result<(), String> {
        let Some(market_data) = self.market_data.get_market_data(symbol) else {
            return Ok(());
        };

        let raw_signal = self
            .aggregator
            .aggregate(&market_data, now_ms)
            .map_err(|e| e.to_string())?;

        info!(target: "audit", symbol, value = raw_signal.value, confidence = ?raw_signal.confidence, "signal_accepted_raw");

        let position = self.positions.get(symbol);
        let decision = self.dedup.evaluate(symbol, &raw_signal, &position, now_ms);
        let Some(signal) = decision.into_signal() else {
            return Ok(());
        };

        let Some(side) = signal.direction() else {
            return Ok(());
        };

        // The router may settle on either leg's configured size depending
        // on which one fills, so the gate is checked against whichever is
        // larger — the worst case the actual fill could reach.
        let worst_case_size = self.config.maker_default_size.max(self.config.ioc_default_size);
        let order_notional = worst_case_size * market_data.mid_price;
        let prospective_position_notional =
            (position.size.abs() + worst_case_size) * market_data.mid_price;
        let slippage_bps = self.slippage.estimate_bps(&market_data, side, worst_case_size);
        let slippage_pct = Decimal::try_from(slippage_bps / 10_000.0).ok();

        let gate = self.hard_limits.evaluate(
            order_notional,
            prospective_position_notional,
            slippage_pct,
            self.current_nav,
        );
        if !gate.is_allowed() {
            warn!(target: "audit", symbol, ?gate, "risk_gate_blocked");
            return Ok(());
        }

        let reference_price = Self::touch_for(&market_data, side);

        let Some(order) = self
            .router
            .route(adapter, &market_data, &signal, side, now_ms)
            .await
            .map_err(|e| e.to_string())?
        else {
            return Ok(());
        };

        if order.status == OrderStatus::Filled {
            // Best price at order time: the book may have moved between
            // the signal snapshot and the order resolving (maker polling
            // especially can take seconds), so this is refetched rather
            // than reused from `market_data`.
            let best_price = self
                .market_data
                .get_market_data(symbol)
                .map(|md| Self::touch_for(&md, side))
                .unwrap_or(reference_price);
            // Estimated against the order's actual type and filled size,
            // not the pre-route assumption, so a maker fill is reconciled
            // against maker economics rather than taker's.
            let estimate = self
                .cost_estimator
                .estimate(&market_data, side, order.filled_size, order.order_type);
            self.apply_fill(symbol, &order, signal.value, estimate, reference_price, best_price, now_ms);
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_fill(
        &mut self,
        symbol: &str,
        order: &crate::types::Order,
        signal_value: f64,
        estimate: crate::types::CostEstimate,
        reference_price: Decimal,
        best_price: Decimal,
        now_ms: i64,
    ) {
        let fill_price = order.avg_fill_price.unwrap_or(order.price);
        self.positions
            .apply_fill(symbol, order.side, order.filled_size, fill_price, now_ms);
        self.positions.mark_price(symbol, fill_price);

        let attribution = self.attributor.attribute(
            signal_value,
            order.filled_size,
            fill_price,
            order.order_type,
            estimate.fee_bps,
            estimate.slippage_bps,
            estimate.impact_bps,
        );

        self.cost_estimator.record_actual(
            order.id.clone(),
            symbol.to_string(),
            order.order_type,
            order.side,
            estimate,
            fill_price,
            reference_price,
            best_price,
            now_ms,
        );

        let position = self.positions.get(symbol);
        self.current_nav += position.realized_pnl;
        self.hard_limits.check_daily_drawdown(self.current_nav);

        info!(
            target: "audit",
            symbol,
            order_id = %order.id,
            side = ?order.side,
            filled_size = %order.filled_size,
            fill_price = %fill_price,
            alpha = %attribution.alpha,
            total_attribution = %attribution.total,
            "order_filled"
        );
    }

    /// Sweeps every open position for a take-profit/stop-loss/timeout
    /// trigger. A triggered close is routed directly to the IOC
    /// executor (4.H), bypassing the hybrid router entirely — the
    /// synthetic close signal is always forced-HIGH, and sending it
    /// through `route_high` would try the maker leg first and let the
    /// close sit resting for up to `high_maker_timeout_ms`, which is
    /// exactly the "queue" behavior a forced close must never do. The
    /// closing size is the position's own size, not the router's fixed
    /// configured size.
    async fn run_position_closer_sweep(&mut self, adapter: &dyn ExecutionAdapter, now_ms: i64) {
        let symbols = self.config.symbols.clone();
        for symbol in &symbols {
            let position = self.positions.get(symbol);
            if position.is_flat() {
                continue;
            }
            self.closer.record_check();

            let outcome = self.tp_sl.check(&position);
            let should_close = match outcome {
                TpSlOutcome::TakeProfit | TpSlOutcome::StopLoss => true,
                TpSlOutcome::Hold => self.closer.is_expired(&position, now_ms),
            };
            if !should_close {
                continue;
            }

            let Some((signal, close_side)) = self.closer.synthetic_close(&position, now_ms) else {
                continue;
            };

            let trigger = match outcome {
                TpSlOutcome::TakeProfit => CloseTrigger::TakeProfit,
                TpSlOutcome::StopLoss => CloseTrigger::StopLoss,
                TpSlOutcome::Hold => CloseTrigger::Timeout,
            };
            self.closer.record_trigger(trigger);

            info!(target: "audit", symbol, ?outcome, ?close_side, "position_close_triggered");

            let close_size = position.size.abs();
            let ioc = IocExecutor::new(close_size, self.close_cross_buffer_bps);
            let snapshot = self.snapshot_for(symbol);

            match ioc.execute(adapter, &snapshot, close_side, now_ms).await {
                Ok(order) if order.status == OrderStatus::Filled => {
                    self.closer.record_close_result(true);
                    let estimate =
                        self.cost_estimator
                            .estimate(&snapshot, close_side, order.filled_size, order.order_type);
                    let reference_price = Self::touch_for(&snapshot, close_side);
                    self.apply_fill(symbol, &order, signal.value, estimate, reference_price, reference_price, now_ms);
                }
                Ok(_) => {
                    self.closer.record_close_result(false);
                    warn!(symbol, "position_close_unfilled");
                }
                Err(e) => {
                    self.closer.record_close_result(false);
                    warn!(symbol, error = %e, "position_close_failed");
                }
            }
        }
    }

    fn snapshot_for(&self, symbol: &str) -> crate::types::MarketData {
        self.market_data
            .get_market_data(symbol)
            .unwrap_or_else(|| crate::types::MarketData {
                symbol: symbol.to_string(),
                timestamp_ms: 0,
                bids: vec![],
                asks: vec![],
                mid_price: Decimal::ZERO,
                trades: vec![],
            })
    }
}

fn decimal_to_bps(rate: Decimal) -> f64 {
    (rate * Decimal::new(10_000, 0)).to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::adapter::{PaperExecutionAdapter, PaperExecutionConfig};

    fn config() -> EngineConfig {
        let mut c = EngineConfig::default();
        c.symbols = vec!["BTC".to_string()];
        c.dedup_cooldown_sec = 0.0;
        c.dedup_change_threshold = 0.0;
        c.theta_high = 0.1;
        c.theta_medium = 0.05;
        c
    }

    fn seeded_market_data_manager() -> MarketDataManager {
        let mut mgr = MarketDataManager::new(&["BTC".to_string()], 10);
        mgr.on_l2_update(
            "BTC",
            &crate::book::RawLevels {
                bids: vec![("29990".to_string(), "5".to_string())],
                asks: vec![("30010".to_string(), "1".to_string())],
            },
            0,
        );
        mgr
    }

    #[tokio::test]
    async fn single_tick_runs_without_panicking() {
        let cfg = config();
        let mgr = seeded_market_data_manager();
        let stop_flag = EngineStopFlag::new();
        let mut engine = TradingEngine::new(cfg, mgr, stop_flag);
        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig {
            simulated_latency_ms: 0,
            ..Default::default()
        });
        engine.run_tick(&adapter, 0).await;
    }

    #[tokio::test]
    async fn decimal_to_bps_converts_correctly() {
        assert!((decimal_to_bps(Decimal::new(15, 5)) - 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn position_closer_sweep_bypasses_the_router_and_uses_position_size() {
        let mut cfg = config();
        // A maker leg that would never fill within the tick — if the
        // sweep routed through the hybrid router instead of calling IOC
        // directly, this would leave the close resting instead of
        // completing within a single sweep call.
        cfg.maker_timeout_high_sec = 9999.0;
        cfg.max_position_age_seconds = 0.0;

        let mgr = seeded_market_data_manager();
        let stop_flag = EngineStopFlag::new();
        let mut engine = TradingEngine::new(cfg, mgr, stop_flag);
        engine
            .positions
            .apply_fill("BTC", OrderSide::Buy, Decimal::new(3, 1), Decimal::new(30_000, 0), 0);

        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig {
            simulated_latency_ms: 0,
            limit_fill_probability: 0.0,
            ioc_fill_probability: 1.0,
            ..Default::default()
        });

        engine.run_position_closer_sweep(&adapter, 10_000).await;

        let position = engine.position_snapshot("BTC");
        assert!(position.is_flat(), "the IOC-direct close should have filled immediately");
        let stats = engine.closer.get_statistics();
        assert_eq!(stats.total_checks, 1);
        assert_eq!(stats.timeout_triggers, 1);
        assert_eq!(stats.close_succeeded, 1);
    }
}
