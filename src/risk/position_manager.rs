//! Position lifecycle (4.K): tracks one `Position` per symbol, applying
//! fills as weighted-average adds, partial/full closes, and reverses.

use std::collections::HashMap;

use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;
use tracing::info;

use crate::types::{OrderSide, Position};

pub struct PositionManager {
    positions: HashMap<String, Position>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
        }
    }

    pub fn get(&self, symbol: &str) -> Position {
        self.positions
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Position::flat(symbol))
    }

    pub fn mark_price(&mut self, symbol: &str, price: Decimal) {
        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::flat(symbol));
        position.current_price = price;
        if !position.is_flat() {
            position.unrealized_pnl = Self::pnl(position.size, position.entry_price, price);
        }
    }

    fn pnl(size: Decimal, entry_price: Decimal, mark: Decimal) -> Decimal {
        size * (mark - entry_price)
    }

    /// Applies a fill of `fill_size` (always positive) on `side` at
    /// `fill_price`. A same-direction fill against an existing position
    /// averages into the entry price (weighted by size); an
    /// opposite-direction fill closes (realising PnL on the closed
    /// portion) up to the current size, then — if the fill size
    /// exceeds the open size — reverses into a brand-new position with
    /// a fresh entry price, side, and open timestamp, whatever the
    /// prior side/timestamp were. The reverse branch always assigns a
    /// new side/timestamp, it does not special-case "was already flat".
    pub fn apply_fill(
        &mut self,
        symbol: &str,
        side: OrderSide,
        fill_size: Decimal,
        fill_price: Decimal,
        now_ms: i64,
    ) {
        let signed_fill = match side {
            OrderSide::Buy => fill_size,
            OrderSide::Sell => -fill_size,
        };

        let position = self
            .positions
            .entry(symbol.to_string())
            .or_insert_with(|| Position::flat(symbol));
        position.current_price = fill_price;

        if position.is_flat() {
            position.size = signed_fill;
            position.entry_price = fill_price;
            position.open_timestamp_ms = Some(now_ms);
            position.side = Some(side);
            info!(symbol, size = %position.size, "position_opened");
            return;
        }

        let same_direction = (position.size > Decimal::ZERO) == (signed_fill > Decimal::ZERO);

        if same_direction {
            let old_size = position.size;
            let new_size = old_size + signed_fill;
            position.entry_price =
                (position.entry_price * old_size.abs() + fill_price * signed_fill.abs())
                    / new_size.abs();
            position.size = new_size;
            info!(symbol, size = %position.size, "position_added");
            return;
        }

        let closing_size = signed_fill.abs().min(position.size.abs());
        let realized = Self::pnl(
            if position.size > Decimal::ZERO {
                closing_size
            } else {
                -closing_size
            },
            position.entry_price,
            fill_price,
        );
        position.realized_pnl += realized;

        let remaining = position.size + signed_fill;

        if remaining.is_zero() {
            position.size = Decimal::ZERO;
            position.entry_price = Decimal::ZERO;
            position.unrealized_pnl = Decimal::ZERO;
            position.open_timestamp_ms = None;
            position.side = None;
            info!(symbol, realized = %realized, "position_closed");
        } else if remaining.signum() == position.size.signum() {
            position.size = remaining;
            info!(symbol, realized = %realized, remaining = %remaining, "position_partial_close");
        } else {
            position.size = remaining;
            position.entry_price = fill_price;
            position.open_timestamp_ms = Some(now_ms);
            position.side = Some(if remaining > Decimal::ZERO {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            });
            info!(symbol, realized = %realized, new_size = %remaining, "position_reversed");
        }
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self::new()
    }
}
