//! Fixed-percentage take-profit / stop-loss (4.L). Boundaries are
//! inclusive; take-profit is checked before stop-loss so a price that
//! satisfies both (a degenerate zero-width band) closes as a win.

use rust_decimal::Decimal;

use crate::types::{OrderSide, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpSlOutcome {
    TakeProfit,
    StopLoss,
    Hold,
}

pub struct TpSlManager {
    take_profit_pct: Decimal,
    stop_loss_pct: Decimal,
}

impl TpSlManager {
    pub fn new(take_profit_pct: Decimal, stop_loss_pct: Decimal) -> Self {
        Self {
            take_profit_pct,
            stop_loss_pct,
        }
    }

    pub fn check(&self, position: &Position) -> TpSlOutcome {
        if position.is_flat() {
            return TpSlOutcome::Hold;
        }
        let Some(side) = position.side else {
            return TpSlOutcome::Hold;
        };
        if position.entry_price.is_zero() {
            return TpSlOutcome::Hold;
        }

        let move_pct = match side {
            OrderSide::Buy => {
                (position.current_price - position.entry_price) / position.entry_price
            }
            OrderSide::Sell => {
                (position.entry_price - position.current_price) / position.entry_price
            }
        };

        if move_pct >= self.take_profit_pct {
            TpSlOutcome::TakeProfit
        } else if move_pct <= -self.stop_loss_pct {
            TpSlOutcome::StopLoss
        } else {
            TpSlOutcome::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_position(entry: Decimal, current: Decimal) -> Position {
        Position {
            symbol: "BTC".into(),
            size: Decimal::ONE,
            entry_price: entry,
            current_price: current,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            open_timestamp_ms: Some(0),
            side: Some(OrderSide::Buy),
        }
    }

    #[test]
    fn flat_position_holds() {
        let tp_sl = TpSlManager::new(Decimal::new(2, 2), Decimal::new(1, 2));
        assert_eq!(tp_sl.check(&Position::flat("BTC")), TpSlOutcome::Hold);
    }

    #[test]
    fn long_hits_take_profit_at_boundary() {
        let tp_sl = TpSlManager::new(Decimal::new(2, 2), Decimal::new(1, 2));
        let position = long_position(Decimal::new(100, 0), Decimal::new(102, 0));
        assert_eq!(tp_sl.check(&position), TpSlOutcome::TakeProfit);
    }

    #[test]
    fn long_hits_stop_loss_at_boundary() {
        let tp_sl = TpSlManager::new(Decimal::new(2, 2), Decimal::new(1, 2));
        let position = long_position(Decimal::new(100, 0), Decimal::new(99, 0));
        assert_eq!(tp_sl.check(&position), TpSlOutcome::StopLoss);
    }

    #[test]
    fn short_profits_on_price_drop() {
        let tp_sl = TpSlManager::new(Decimal::new(2, 2), Decimal::new(1, 2));
        let mut position = long_position(Decimal::new(100, 0), Decimal::new(98, 0));
        position.side = Some(OrderSide::Sell);
        assert_eq!(tp_sl.check(&position), TpSlOutcome::TakeProfit);
    }

    #[test]
    fn within_band_holds() {
        let tp_sl = TpSlManager::new(Decimal::new(2, 2), Decimal::new(1, 2));
        let position = long_position(Decimal::new(100, 0), Decimal::new(100, 5));
        assert_eq!(tp_sl.check(&position), TpSlOutcome::Hold);
    }
}
