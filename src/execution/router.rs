//! Hybrid order routing (4.J): chooses an execution path by confidence
//! tier, with an optional taker fallback when the maker leg doesn't
//! fill in time.
//!
//! HIGH always attempts maker first, then falls back to IOC unless
//! `enable_fallback` is disabled. MEDIUM attempts maker only, and only
//! escalates to a forced-HIGH IOC fallback when `fallback_on_medium` is
//! explicitly turned on — both flags are independent, matching the
//! executor's own constructor parameters. LOW signals are never routed.

use std::sync::atomic::{AtomicU64, Ordering};

use rust_decimal::Decimal;
use tracing::info;

use crate::error::EngineResult;
use crate::execution::adapter::ExecutionAdapter;
use crate::execution::ioc::IocExecutor;
use crate::execution::maker::MakerExecutor;
use crate::types::{ConfidenceLevel, MarketData, Order, OrderSide, OrderStatus, SignalScore};

pub struct RouterConfig {
    pub ioc_size: Decimal,
    pub maker_size: Decimal,
    pub high_maker_timeout_ms: u64,
    pub medium_maker_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub cross_buffer_bps: Decimal,
    pub maker_tick_offset: Decimal,
    pub enable_fallback: bool,
    pub fallback_on_medium: bool,
}

/// A snapshot of the router's lifetime execution counters, mirroring
/// the venue's own `get_statistics()` surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterStats {
    pub high_signals: u64,
    pub medium_signals: u64,
    pub low_signals: u64,
    pub maker_executions: u64,
    pub ioc_executions: u64,
    pub fallback_executions: u64,
    pub skipped_signals: u64,
}

pub struct OrderRouter {
    config: RouterConfig,
    ioc: IocExecutor,
    high_signals: AtomicU64,
    medium_signals: AtomicU64,
    low_signals: AtomicU64,
    maker_executions: AtomicU64,
    ioc_executions: AtomicU64,
    fallback_executions: AtomicU64,
    skipped_signals: AtomicU64,
}

impl OrderRouter {
    pub fn new(config: RouterConfig) -> Self {
        let ioc = IocExecutor::new(config.ioc_size, config.cross_buffer_bps);
        Self {
            config,
            ioc,
            high_signals: AtomicU64::new(0),
            medium_signals: AtomicU64::new(0),
            low_signals: AtomicU64::new(0),
            maker_executions: AtomicU64::new(0),
            ioc_executions: AtomicU64::new(0),
            fallback_executions: AtomicU64::new(0),
            skipped_signals: AtomicU64::new(0),
        }
    }

    pub fn get_statistics(&self) -> RouterStats {
        RouterStats {
            high_signals: self.high_signals.load(Ordering::Relaxed),
            medium_signals: self.medium_signals.load(Ordering::Relaxed),
            low_signals: self.low_signals.load(Ordering::Relaxed),
            maker_executions: self.maker_executions.load(Ordering::Relaxed),
            ioc_executions: self.ioc_executions.load(Ordering::Relaxed),
            fallback_executions: self.fallback_executions.load(Ordering::Relaxed),
            skipped_signals: self.skipped_signals.load(Ordering::Relaxed),
        }
    }

    /// Routes a deduplicated, confidence-tiered signal to an order. A
    /// `None` confidence means LOW and is skipped by the caller before
    /// this is reached; `route` itself handles only MEDIUM/HIGH.
    pub async fn route(
        &self,
        adapter: &dyn ExecutionAdapter,
        market_data: &MarketData,
        signal: &SignalScore,
        side: OrderSide,
        now_ms: i64,
    ) -> EngineResult<Option<Order>> {
        match signal.confidence {
            ConfidenceLevel::Low => {
                self.low_signals.fetch_add(1, Ordering::Relaxed);
                self.skipped_signals.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            ConfidenceLevel::High => {
                self.high_signals.fetch_add(1, Ordering::Relaxed);
                self.route_high(adapter, market_data, side, now_ms).await
            }
            ConfidenceLevel::Medium => {
                self.medium_signals.fetch_add(1, Ordering::Relaxed);
                self.route_medium(adapter, market_data, side, now_ms).await
            }
        }
    }

    async fn route_high(
        &self,
        adapter: &dyn ExecutionAdapter,
        market_data: &MarketData,
        side: OrderSide,
        now_ms: i64,
    ) -> EngineResult<Option<Order>> {
        let maker = MakerExecutor::new(
            self.config.maker_size,
            self.config.high_maker_timeout_ms,
            self.config.poll_interval_ms,
            self.config.maker_tick_offset,
        );
        let maker_order = maker.execute(adapter, market_data, side, now_ms).await?;

        if maker_order.status == OrderStatus::Filled {
            self.maker_executions.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(maker_order));
        }

        if !self.config.enable_fallback {
            info!(symbol = %market_data.symbol, "router_high_no_fallback_unfilled");
            return Ok(Some(maker_order));
        }

        info!(target: "audit", symbol = %market_data.symbol, reason = "maker_timeout", "router_high_fallback_to_ioc");
        self.fallback_executions.fetch_add(1, Ordering::Relaxed);
        let ioc_order = self.ioc.execute(adapter, market_data, side, now_ms).await?;
        self.ioc_executions.fetch_add(1, Ordering::Relaxed);
        Ok(Some(ioc_order))
    }

    async fn route_medium(
        &self,
        adapter: &dyn ExecutionAdapter,
        market_data: &MarketData,
        side: OrderSide,
        now_ms: i64,
    ) -> EngineResult<Option<Order>> {
        let maker = MakerExecutor::new(
            self.config.maker_size,
            self.config.medium_maker_timeout_ms,
            self.config.poll_interval_ms,
            self.config.maker_tick_offset,
        );
        let maker_order = maker.execute(adapter, market_data, side, now_ms).await?;

        if maker_order.status == OrderStatus::Filled {
            self.maker_executions.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(maker_order));
        }

        if !self.config.fallback_on_medium {
            info!(symbol = %market_data.symbol, "router_medium_no_fallback_unfilled");
            return Ok(Some(maker_order));
        }

        info!(target: "audit", symbol = %market_data.symbol, reason = "maker_timeout", "router_medium_fallback_to_ioc");
        self.fallback_executions.fetch_add(1, Ordering::Relaxed);
        let ioc_order = self.ioc.execute(adapter, market_data, side, now_ms).await?;
        self.ioc_executions.fetch_add(1, Ordering::Relaxed);
        Ok(Some(ioc_order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::adapter::{PaperExecutionAdapter, PaperExecutionConfig};
    use crate::types::{Level, OrderBookSnapshot};

    fn market_data() -> MarketData {
        let snap = OrderBookSnapshot {
            symbol: "BTC".into(),
            timestamp_ms: 0,
            bids: vec![Level::new(Decimal::new(29990, 1), Decimal::ONE)],
            asks: vec![Level::new(Decimal::new(30010, 1), Decimal::ONE)],
            mid_price: Decimal::new(30000, 1),
        };
        MarketData::from_book(&snap, vec![])
    }

    fn score(confidence: ConfidenceLevel) -> SignalScore {
        SignalScore::new(0.6, confidence, vec![0.0, 0.0, 0.0], 0).unwrap()
    }

    fn router(enable_fallback: bool, fallback_on_medium: bool) -> OrderRouter {
        OrderRouter::new(RouterConfig {
            ioc_size: Decimal::ONE,
            maker_size: Decimal::ONE,
            high_maker_timeout_ms: 20,
            medium_maker_timeout_ms: 20,
            poll_interval_ms: 5,
            cross_buffer_bps: Decimal::new(5, 0),
            maker_tick_offset: Decimal::new(1, 1),
            enable_fallback,
            fallback_on_medium,
        })
    }

    #[tokio::test]
    async fn low_confidence_is_never_routed() {
        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig::default());
        let r = router(true, false);
        let order = r
            .route(&adapter, &market_data(), &score(ConfidenceLevel::Low), OrderSide::Buy, 0)
            .await
            .unwrap();
        assert!(order.is_none());
        let stats = r.get_statistics();
        assert_eq!(stats.low_signals, 1);
        assert_eq!(stats.skipped_signals, 1);
    }

    #[tokio::test]
    async fn high_falls_back_to_ioc_when_maker_times_out() {
        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig {
            simulated_latency_ms: 0,
            limit_fill_probability: 0.0,
            ioc_fill_probability: 1.0,
            ..Default::default()
        });
        let r = router(true, false);
        let order = r
            .route(&adapter, &market_data(), &score(ConfidenceLevel::High), OrderSide::Buy, 0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.order_type, crate::types::OrderType::Ioc);
        assert_eq!(order.status, OrderStatus::Filled);
        let stats = r.get_statistics();
        assert_eq!(stats.fallback_executions, 1);
        assert_eq!(stats.ioc_executions, 1);
        assert_eq!(stats.maker_executions, 0);
    }

    #[tokio::test]
    async fn medium_stays_unfilled_without_forced_fallback() {
        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig {
            simulated_latency_ms: 0,
            limit_fill_probability: 0.0,
            ..Default::default()
        });
        let r = router(true, false);
        let order = r
            .route(
                &adapter,
                &market_data(),
                &score(ConfidenceLevel::Medium),
                OrderSide::Buy,
                0,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.order_type, crate::types::OrderType::Limit);
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(r.get_statistics().fallback_executions, 0);
    }

    #[tokio::test]
    async fn medium_falls_back_when_flag_enabled() {
        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig {
            simulated_latency_ms: 0,
            limit_fill_probability: 0.0,
            ioc_fill_probability: 1.0,
            ..Default::default()
        });
        let r = router(true, true);
        let order = r
            .route(
                &adapter,
                &market_data(),
                &score(ConfidenceLevel::Medium),
                OrderSide::Buy,
                0,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.order_type, crate::types::OrderType::Ioc);
        assert_eq!(r.get_statistics().fallback_executions, 1);
    }

    #[tokio::test]
    async fn filled_maker_order_counts_toward_maker_executions() {
        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig {
            simulated_latency_ms: 0,
            limit_fill_probability: 1.0,
            ..Default::default()
        });
        let r = router(true, false);
        r.route(&adapter, &market_data(), &score(ConfidenceLevel::High), OrderSide::Buy, 0)
            .await
            .unwrap();
        let stats = r.get_statistics();
        assert_eq!(stats.maker_executions, 1);
        assert_eq!(stats.fallback_executions, 0);
    }
}
