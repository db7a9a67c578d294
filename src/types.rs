//! Core data model: the typed values that flow between every component.
//!
//! Monetary quantities (prices, sizes, PnL, fee rates) are
//! `rust_decimal::Decimal` so they carry bit-for-bit precision through
//! arithmetic. Signals and ratios are `f64` — they are statistical
//! estimates, not ledger entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// Parses venue-specific side codes ("B"/"A" or "BUY"/"SELL") into
    /// the internal enum.
    pub fn from_venue_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "B" | "BUY" | "BID" => Some(OrderSide::Buy),
            "A" | "S" | "SELL" | "ASK" => Some(OrderSide::Sell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Ioc,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    PartialFilled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

/// A single price/size rung of the book. Size is always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    pub size: Decimal,
}

impl Level {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// A depth-of-book view at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub timestamp_ms: i64,
    /// Monotonically non-increasing in price.
    pub bids: Vec<Level>,
    /// Monotonically non-decreasing in price.
    pub asks: Vec<Level>,
    pub mid_price: Decimal,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }

    pub fn is_valid(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(a.price - b.price),
            _ => None,
        }
    }

    pub fn spread_bps(&self) -> Option<f64> {
        let spread = self.spread()?;
        if self.mid_price.is_zero() {
            return None;
        }
        let ratio = spread / self.mid_price;
        ratio.to_string().parse::<f64>().ok().map(|r| r * 10_000.0)
    }

    pub fn depth(&self, k: usize) -> (&[Level], &[Level]) {
        let bid_n = k.min(self.bids.len());
        let ask_n = k.min(self.asks.len());
        (&self.bids[..bid_n], &self.asks[..ask_n])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp_ms: i64,
    pub price: Decimal,
    pub size: Decimal,
    pub side: OrderSide,
}

/// The maximum number of recent trades retained per symbol.
pub const MAX_TRADE_HISTORY: usize = 1000;
/// The maximum number of recent trades surfaced in a `MarketData` snapshot.
pub const MARKET_DATA_TRADE_TAIL: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub timestamp_ms: i64,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub mid_price: Decimal,
    pub trades: Vec<Trade>,
}

impl MarketData {
    pub fn from_book(book: &OrderBookSnapshot, trades: Vec<Trade>) -> Self {
        Self {
            symbol: book.symbol.clone(),
            timestamp_ms: book.timestamp_ms,
            bids: book.bids.clone(),
            asks: book.asks.clone(),
            mid_price: book.mid_price,
            trades,
        }
    }

    pub fn best_bid(&self) -> Option<Level> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<Level> {
        self.asks.first().copied()
    }
}

/// A confidence-tiered signal value in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalScore {
    pub value: f64,
    pub confidence: ConfidenceLevel,
    pub components: Vec<f64>,
    pub timestamp_ms: i64,
}

impl SignalScore {
    pub fn new(
        value: f64,
        confidence: ConfidenceLevel,
        components: Vec<f64>,
        timestamp_ms: i64,
    ) -> EngineResult<Self> {
        if !(-1.0..=1.0).contains(&value) {
            return Err(EngineError::InvalidSignalValue { value });
        }
        Ok(Self {
            value,
            confidence,
            components,
            timestamp_ms,
        })
    }

    pub fn direction(&self) -> Option<OrderSide> {
        if self.value > 0.0 {
            Some(OrderSide::Buy)
        } else if self.value < 0.0 {
            Some(OrderSide::Sell)
        } else {
            None
        }
    }

    /// A forced-HIGH copy of this signal, used by the router's fallback
    /// path and the position closer's synthetic close signal.
    pub fn with_forced_high(&self) -> Self {
        Self {
            value: self.value,
            confidence: ConfidenceLevel::High,
            components: self.components.clone(),
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// A per-symbol position. `side`/`open_timestamp_ms` are `Some` exactly
/// when `size != 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub open_timestamp_ms: Option<i64>,
    pub side: Option<OrderSide>,
}

impl Position {
    pub fn flat(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            current_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            open_timestamp_ms: None,
            side: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.size < Decimal::ZERO
    }

    pub fn position_value_usd(&self) -> Decimal {
        self.size.abs() * self.current_price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub price: Decimal,
    pub size: Decimal,
    pub filled_size: Decimal,
    pub status: OrderStatus,
    pub created_at_ms: i64,
    pub avg_fill_price: Option<Decimal>,
    pub error: Option<String>,
}

/// Ex-ante cost breakdown for a prospective order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub fee_bps: f64,
    pub slippage_bps: f64,
    pub impact_bps: f64,
    pub total_bps: f64,
    pub spread_bps: f64,
    pub liquidity_score: f64,
    pub volatility_score: f64,
}

/// Ex-post realised cost, compared against the estimate that preceded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostActual {
    pub order_id: String,
    pub symbol: String,
    pub order_type: OrderType,
    pub estimate: CostEstimate,
    pub actual_fee_bps: f64,
    pub actual_slippage_bps: f64,
    pub actual_impact_bps: f64,
    pub actual_total_bps: f64,
    /// `(actual - estimated) / estimated * 100`. `None` when the
    /// estimate was zero (division is undefined; reported as +inf in
    /// aggregates rather than stored as such).
    pub estimation_error_pct: Option<f64>,
    pub timestamp_ms: i64,
}

/// Per-trade PnL decomposition. `total = alpha + fee + slippage + impact + rebate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeAttribution {
    pub alpha: Decimal,
    pub fee: Decimal,
    pub slippage: Decimal,
    pub impact: Decimal,
    pub rebate: Decimal,
    pub total: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_score_rejects_out_of_range() {
        let err = SignalScore::new(1.5, ConfidenceLevel::High, vec![], 0).unwrap_err();
        assert_eq!(err, EngineError::InvalidSignalValue { value: 1.5 });
    }

    #[test]
    fn signal_score_accepts_boundary_values() {
        assert!(SignalScore::new(1.0, ConfidenceLevel::High, vec![], 0).is_ok());
        assert!(SignalScore::new(-1.0, ConfidenceLevel::High, vec![], 0).is_ok());
    }

    #[test]
    fn side_from_venue_code_handles_both_conventions() {
        assert_eq!(OrderSide::from_venue_code("B"), Some(OrderSide::Buy));
        assert_eq!(OrderSide::from_venue_code("sell"), Some(OrderSide::Sell));
        assert_eq!(OrderSide::from_venue_code("A"), Some(OrderSide::Sell));
        assert_eq!(OrderSide::from_venue_code("?"), None);
    }

    #[test]
    fn position_flat_has_no_side_or_timestamp() {
        let p = Position::flat("BTC");
        assert!(p.is_flat());
        assert!(p.side.is_none());
        assert!(p.open_timestamp_ms.is_none());
        assert_eq!(p.entry_price, Decimal::ZERO);
    }
}
