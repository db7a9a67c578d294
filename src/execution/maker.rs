//! Shallow maker execution (4.I): posts a passive limit order just
//! inside the touch, polls for a fill up to a timeout, and cancels if
//! it hasn't filled by then so the router can fall back.

use rust_decimal::Decimal;
use tokio::time::{sleep, Duration, Instant};
use tracing::info;

use crate::error::EngineResult;
use crate::execution::adapter::{AdapterOrderStatus, ExecutionAdapter, OrderRequest};
use crate::types::{MarketData, Order, OrderSide, OrderStatus, OrderType};

pub struct MakerExecutor {
    size: Decimal,
    timeout_ms: u64,
    poll_interval_ms: u64,
    /// Distance beyond the touch the order posts at, so it doesn't just
    /// join the back of an existing level: BUY posts at
    /// `best_bid + tick_offset`, SELL at `best_ask - tick_offset`.
    tick_offset: Decimal,
}

impl MakerExecutor {
    pub fn new(size: Decimal, timeout_ms: u64, poll_interval_ms: u64, tick_offset: Decimal) -> Self {
        Self {
            size,
            timeout_ms,
            poll_interval_ms,
            tick_offset,
        }
    }

    fn post_price(&self, market_data: &MarketData, side: OrderSide) -> Option<Decimal> {
        match side {
            OrderSide::Buy => Some(market_data.best_bid()?.price + self.tick_offset),
            OrderSide::Sell => Some(market_data.best_ask()?.price - self.tick_offset),
        }
    }

    /// Places the order, then polls `order_status` until it fills or
    /// `timeout_ms` elapses, at which point it cancels and returns the
    /// (possibly partial) resting state. Callers decide whether to
    /// fall back to a taker order from there.
    pub async fn execute(
        &self,
        adapter: &dyn ExecutionAdapter,
        market_data: &MarketData,
        side: OrderSide,
        created_at_ms: i64,
    ) -> EngineResult<Order> {
        let Some(price) = self.post_price(market_data, side) else {
            return Ok(Order {
                id: String::new(),
                symbol: market_data.symbol.clone(),
                side,
                order_type: OrderType::Limit,
                price: Decimal::ZERO,
                size: self.size,
                filled_size: Decimal::ZERO,
                status: OrderStatus::Rejected,
                created_at_ms,
                avg_fill_price: None,
                error: Some("no own-side touch to post at".to_string()),
            });
        };

        let ack = adapter
            .place_order(OrderRequest {
                symbol: market_data.symbol.clone(),
                side,
                size: self.size,
                price,
                order_type: OrderType::Limit,
                post_only: true,
            })
            .await?;

        let mut status = ack.status;
        let deadline = Instant::now() + Duration::from_millis(self.timeout_ms);

        while matches!(status, AdapterOrderStatus::Resting) && Instant::now() < deadline {
            sleep(Duration::from_millis(self.poll_interval_ms)).await;
            status = adapter.order_status(&ack.order_id).await?;
        }

        if matches!(status, AdapterOrderStatus::Resting) {
            adapter.cancel_order(&ack.order_id).await?;
            status = AdapterOrderStatus::Cancelled;
        }

        let (order_status, filled_size, avg_fill_price) = match status {
            AdapterOrderStatus::Filled { filled_size } => {
                (OrderStatus::Filled, filled_size, Some(price))
            }
            AdapterOrderStatus::Cancelled => (OrderStatus::Cancelled, Decimal::ZERO, None),
            AdapterOrderStatus::Rejected { .. } => (OrderStatus::Rejected, Decimal::ZERO, None),
            AdapterOrderStatus::Resting => (OrderStatus::Cancelled, Decimal::ZERO, None),
        };

        info!(symbol = %market_data.symbol, ?side, ?order_status, "maker_execute");

        Ok(Order {
            id: ack.order_id,
            symbol: market_data.symbol.clone(),
            side,
            order_type: OrderType::Limit,
            price,
            size: self.size,
            filled_size,
            status: order_status,
            created_at_ms,
            avg_fill_price,
            error: None,
        })
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

    #[tokio::test]
    async fn posts_inside_the_touch_by_the_tick_offset() {
        let executor = MakerExecutor::new(Decimal::ONE, 50, 5, Decimal::new(1, 1));
        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig {
            simulated_latency_ms: 0,
            limit_fill_probability: 1.0,
            ..Default::default()
        });
        let order = executor
            .execute(&adapter, &market_data(), OrderSide::Buy, 0)
            .await
            .unwrap();
        assert_eq!(order.price, Decimal::new(30000, 1));
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn sell_posts_below_the_ask_by_the_tick_offset() {
        let executor = MakerExecutor::new(Decimal::ONE, 50, 5, Decimal::new(1, 1));
        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig {
            simulated_latency_ms: 0,
            limit_fill_probability: 1.0,
            ..Default::default()
        });
        let order = executor
            .execute(&adapter, &market_data(), OrderSide::Sell, 0)
            .await
            .unwrap();
        assert_eq!(order.price, Decimal::new(30000, 1));
    }

    #[tokio::test]
    async fn cancels_on_timeout_when_never_fills() {
        let executor = MakerExecutor::new(Decimal::ONE, 20, 5, Decimal::new(1, 1));
        let adapter = PaperExecutionAdapter::new(PaperExecutionConfig {
            simulated_latency_ms: 0,
            limit_fill_probability: 0.0,
            ..Default::default()
        });
        let order = executor
            .execute(&adapter, &market_data(), OrderSide::Sell, 0)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }
}
