//! IOC (immediate-or-cancel) execution (4.H): a single taker order
//! priced to cross the spread and fill now, sized for the signal's
//! confidence tier.

use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::execution::adapter::{AdapterOrderStatus, ExecutionAdapter, OrderRequest};
use crate::types::{MarketData, Order, OrderSide, OrderStatus, OrderType};

/// Above this round-trip latency the taker fill is considered slow
/// enough to be worth flagging — by the time the ack lands the book
/// may have already moved past the price that was crossed.
const LATENCY_WARN_THRESHOLD_MS: u128 = 100;

pub struct IocExecutor {
    size: Decimal,
    /// Extra bps beyond the touch the limit price is placed at, so the
    /// order crosses the spread and actually executes as IOC on venues
    /// that reject marketable orders priced exactly at the touch.
    cross_buffer_bps: Decimal,
}

impl IocExecutor {
    pub fn new(size: Decimal, cross_buffer_bps: Decimal) -> Self {
        Self {
            size,
            cross_buffer_bps,
        }
    }

    fn cross_price(&self, market_data: &MarketData, side: OrderSide) -> Option<Decimal> {
        let touch = match side {
            OrderSide::Buy => market_data.best_ask()?.price,
            OrderSide::Sell => market_data.best_bid()?.price,
        };
        let buffer = touch * self.cross_buffer_bps / Decimal::new(10_000, 0);
        Some(match side {
            OrderSide::Buy => touch + buffer,
            OrderSide::Sell => touch - buffer,
        })
    }

    pub async fn execute(
        &self,
        adapter: &dyn ExecutionAdapter,
        market_data: &MarketData,
        side: OrderSide,
        created_at_ms: i64,
    ) -> EngineResult<Order> {
        let Some(price) = self.cross_price(market_data, side) else {
            return Ok(Order {
                id: String::new(),
                symbol: market_data.symbol.clone(),
                side,
                order_type: OrderType::Ioc,
                price: Decimal::ZERO,
                size: self.size,
                filled_size: Decimal::ZERO,
                status: OrderStatus::Rejected,
                created_at_ms,
                avg_fill_price: None,
                error: Some("no opposing touch to cross".to_string()),
            });
        };

        let placed_at = Instant::now();
        let ack = adapter
            .place_order(OrderRequest {
                symbol: market_data.symbol.clone(),
                side,
                size: self.size,
                price,
                order_type: OrderType::Ioc,
                post_only: false,
            })
            .await?;
        let latency_ms = placed_at.elapsed().as_millis();

        if latency_ms > LATENCY_WARN_THRESHOLD_MS {
            warn!(symbol = %market_data.symbol, latency_ms, "ioc_latency_above_threshold");
        }

        let (status, filled_size, avg_fill_price) = match ack.status {
            AdapterOrderStatus::Filled { filled_size } => {
                (OrderStatus::Filled, filled_size, Some(price))
            }
            AdapterOrderStatus::Cancelled => (OrderStatus::Cancelled, Decimal::ZERO, None),
            AdapterOrderStatus::Rejected { .. } => (OrderStatus::Rejected, Decimal::ZERO, None),
            AdapterOrderStatus::Resting => (OrderStatus::Cancelled, Decimal::ZERO, None),
        };

        info!(symbol = %market_data.symbol, ?side, ?status, latency_ms, "ioc_execute");

        Ok(Order {
            id: ack.order_id,
            symbol: market_data.symbol.clone(),
            side,
            order_type: OrderType::Ioc,
            price,
            size: self.size,
            filled_size,
            status,
            created_at_ms,
            avg_fill_price,
            error: None,
        })
    }
}
