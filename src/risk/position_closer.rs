//! Position-age timeout closing (4.M): positions open longer than
//! `max_position_age_seconds`, or that have hit take-profit/stop-loss,
//! are closed with a synthetic forced-HIGH signal that bypasses the
//! deduplicator entirely and always routes directly to the taker (IOC)
//! leg, never through the maker-first hybrid router — a closing order
//! needs to complete now, not queue behind a resting maker leg.

use tracing::info;

use crate::types::{ConfidenceLevel, OrderSide, Position, SignalScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseTrigger {
    TakeProfit,
    StopLoss,
    Timeout,
}

/// Lifetime counters for the position-closer sweep, mirroring the
/// venue's own close-loop bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionCloserStats {
    pub total_checks: u64,
    pub take_profit_triggers: u64,
    pub stop_loss_triggers: u64,
    pub timeout_triggers: u64,
    pub close_succeeded: u64,
    pub close_failed: u64,
}

pub struct PositionCloser {
    max_position_age_ms: i64,
    stats: PositionCloserStats,
}

impl PositionCloser {
    pub fn new(max_position_age_seconds: f64) -> Self {
        Self {
            max_position_age_ms: (max_position_age_seconds * 1000.0) as i64,
            stats: PositionCloserStats::default(),
        }
    }

    pub fn is_expired(&self, position: &Position, now_ms: i64) -> bool {
        match position.open_timestamp_ms {
            Some(opened_at) => now_ms - opened_at >= self.max_position_age_ms,
            None => false,
        }
    }

    /// Builds the synthetic close order: a forced-HIGH signal whose
    /// direction is the opposite of the open position's side, and the
    /// closing side itself for the caller to execute against.
    pub fn synthetic_close(&self, position: &Position, now_ms: i64) -> Option<(SignalScore, OrderSide)> {
        let side = position.side?;
        let close_side = side.opposite();
        let value = match close_side {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        };
        let signal = SignalScore::new(value, ConfidenceLevel::High, vec![], now_ms).ok()?;
        info!(symbol = %position.symbol, ?close_side, "position_timeout_close");
        Some((signal, close_side))
    }

    pub fn record_check(&mut self) {
        self.stats.total_checks += 1;
    }

    pub fn record_trigger(&mut self, trigger: CloseTrigger) {
        match trigger {
            CloseTrigger::TakeProfit => self.stats.take_profit_triggers += 1,
            CloseTrigger::StopLoss => self.stats.stop_loss_triggers += 1,
            CloseTrigger::Timeout => self.stats.timeout_triggers += 1,
        }
    }

    pub fn record_close_result(&mut self, succeeded: bool) {
        if succeeded {
            self.stats.close_succeeded += 1;
        } else {
            self.stats.close_failed += 1;
        }
    }

    pub fn get_statistics(&self) -> PositionCloserStats {
        self.stats
    }
}
