//! Hard pre-trade risk gates (4.N): single-loss cap, daily drawdown,
//! and position-size cap, evaluated in that order before any order is
//! routed.
//!
//! The single-loss and daily-drawdown gates are **sticky**: once
//! breached they stay breached until explicitly cleared via
//! `reset_breach()`, even if NAV recovers or a new calendar day begins.
//! The drawdown cap itself stays denominated in the session's initial
//! NAV for its entire lifetime, but the drawdown it's measured
//! *against* is intraday peak-to-trough — `daily_peak_nav` tracks the
//! highest NAV seen since the last day rollover, and a position that
//! runs up profit and gives it back trips the gate even if NAV never
//! dips below where the day started. The position-size gate is **not**
//! sticky; it re-evaluates the prospective order's notional against
//! the cap on every call independent of past breaches.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskGateOutcome {
    Allowed,
    BlockedSingleLoss,
    BlockedDailyDrawdown,
    BlockedPositionSize,
}

impl RiskGateOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RiskGateOutcome::Allowed)
    }
}

/// A reporting snapshot of the gate state, for dashboards/operator
/// tooling rather than the hot trading path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardLimitsStatus {
    pub initial_nav: Decimal,
    pub current_nav: Decimal,
    pub daily_peak_nav: Decimal,
    pub daily_pnl: Decimal,
    pub single_loss_breached: bool,
    pub daily_drawdown_breached: bool,
    /// Current intraday drawdown as a percentage of the allowed cap —
    /// 100.0 means the cap has been fully consumed.
    pub daily_drawdown_utilization_pct: f64,
}

pub struct HardLimits {
    initial_nav: Decimal,
    max_single_loss_pct: Decimal,
    max_daily_drawdown_pct: Decimal,
    max_position_size_usd: Decimal,
    fallback_slippage_pct: Decimal,
    single_loss_breached: bool,
    daily_drawdown_breached: bool,
    daily_peak_nav: Decimal,
    daily_start_nav: Decimal,
}

impl HardLimits {
    pub fn new(
        initial_nav: Decimal,
        max_single_loss_pct: Decimal,
        max_daily_drawdown_pct: Decimal,
        max_position_size_usd: Decimal,
        fallback_slippage_pct: Decimal,
    ) -> Self {
        Self {
            initial_nav,
            max_single_loss_pct,
            max_daily_drawdown_pct,
            max_position_size_usd,
            fallback_slippage_pct,
            single_loss_breached: false,
            daily_drawdown_breached: false,
            daily_peak_nav: initial_nav,
            daily_start_nav: initial_nav,
        }
    }

    /// `estimated_slippage_pct` comes from the cost estimator's
    /// slippage leg when available; `None` falls back to the
    /// configured flat estimate.
    fn effective_loss_estimate_pct(&self, estimated_slippage_pct: Option<Decimal>) -> Decimal {
        estimated_slippage_pct.unwrap_or(self.fallback_slippage_pct)
    }

    pub fn check_single_loss(
        &mut self,
        order_notional_usd: Decimal,
        estimated_slippage_pct: Option<Decimal>,
    ) -> bool {
        if self.single_loss_breached {
            return false;
        }
        let loss_pct = self.effective_loss_estimate_pct(estimated_slippage_pct);
        let estimated_loss = order_notional_usd * loss_pct;
        let cap = self.initial_nav * self.max_single_loss_pct;
        if estimated_loss > cap {
            warn!(estimated_loss = %estimated_loss, cap = %cap, "hard_limit_single_loss_breached");
            self.single_loss_breached = true;
            return false;
        }
        true
    }

    /// Updates `daily_peak_nav` from `current_nav` before evaluating —
    /// this is the call site that stands in for `update_pnl()`, so the
    /// peak is always current by the time the gate is checked.
    pub fn check_daily_drawdown(&mut self, current_nav: Decimal) -> bool {
        if current_nav > self.daily_peak_nav {
            self.daily_peak_nav = current_nav;
        }
        if self.daily_drawdown_breached {
            return false;
        }
        if self.initial_nav.is_zero() {
            return true;
        }
        let drawdown_pct = (self.daily_peak_nav - current_nav) / self.initial_nav;
        if drawdown_pct >= self.max_daily_drawdown_pct {
            warn!(drawdown_pct = %drawdown_pct, daily_peak_nav = %self.daily_peak_nav, "hard_limit_daily_drawdown_breached");
            self.daily_drawdown_breached = true;
            return false;
        }
        true
    }

    pub fn check_position_size(&self, prospective_notional_usd: Decimal) -> bool {
        prospective_notional_usd <= self.max_position_size_usd
    }

    pub fn evaluate(
        &mut self,
        order_notional_usd: Decimal,
        prospective_position_notional_usd: Decimal,
        estimated_slippage_pct: Option<Decimal>,
        current_nav: Decimal,
    ) -> RiskGateOutcome {
        if !self.check_single_loss(order_notional_usd, estimated_slippage_pct) {
            return RiskGateOutcome::BlockedSingleLoss;
        }
        if !self.check_daily_drawdown(current_nav) {
            return RiskGateOutcome::BlockedDailyDrawdown;
        }
        if !self.check_position_size(prospective_position_notional_usd) {
            return RiskGateOutcome::BlockedPositionSize;
        }
        RiskGateOutcome::Allowed
    }

    /// Resets `daily_peak_nav` and the day's starting NAV to
    /// `current_nav` at a calendar-day boundary. Does **not** clear a
    /// sticky breach — that requires an explicit `reset_breach()` call,
    /// since a new day shouldn't silently re-open trading after a real
    /// breach.
    pub fn roll_day(&mut self, current_nav: Decimal) {
        self.daily_peak_nav = current_nav;
        self.daily_start_nav = current_nav;
    }

    /// Explicit operator action to clear both sticky breach flags,
    /// e.g. after a manual review confirms it's safe to resume trading.
    pub fn reset_breach(&mut self) {
        self.single_loss_breached = false;
        self.daily_drawdown_breached = false;
    }

    pub fn status(&self, current_nav: Decimal) -> HardLimitsStatus {
        let cap = self.initial_nav * self.max_daily_drawdown_pct;
        let drawdown = self.daily_peak_nav - current_nav;
        let utilization_pct = if cap.is_zero() {
            0.0
        } else {
            (drawdown / cap).to_f64().unwrap_or(0.0) * 100.0
        };
        HardLimitsStatus {
            initial_nav: self.initial_nav,
            current_nav,
            daily_peak_nav: self.daily_peak_nav,
            daily_pnl: current_nav - self.daily_start_nav,
            single_loss_breached: self.single_loss_breached,
            daily_drawdown_breached: self.daily_drawdown_breached,
            daily_drawdown_utilization_pct: utilization_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> HardLimits {
        HardLimits::new(
            Decimal::new(100_000, 0),
            Decimal::new(8, 3),   // 0.8%
            Decimal::new(5, 2),   // 5%
            Decimal::new(10_000, 0),
            Decimal::new(1, 2), // 1% fallback slippage
        )
    }

    #[test]
    fn single_loss_breach_is_sticky() {
        let mut limits = limits();
        // notional large enough * 1% fallback slippage to exceed 0.8% of 100k = 800
        assert!(!limits.check_single_loss(Decimal::new(200_000, 0), None));
        assert!(limits.single_loss_breached);
        // even a tiny order is now blocked
        assert!(!limits.check_single_loss(Decimal::ONE, None));
    }

    #[test]
    fn daily_drawdown_stays_breached_until_explicit_reset() {
        let mut limits = limits();
        assert!(!limits.check_daily_drawdown(Decimal::new(90_000, 0))); // 10% drawdown > 5%
        assert!(limits.daily_drawdown_breached);
        // NAV recovers fully, but the breach is sticky
        assert!(!limits.check_daily_drawdown(Decimal::new(100_000, 0)));
        limits.reset_breach();
        assert!(limits.check_daily_drawdown(Decimal::new(100_000, 0)));
    }

    #[test]
    fn drawdown_is_measured_from_the_intraday_peak_not_the_initial_nav() {
        let mut limits = limits();
        // NAV runs up to 110k, then gives back 6k (110k -> 104k): that's
        // a 5.45% peak-to-trough drawdown, over the 5% cap, even though
        // 104k is still above the initial 100k.
        assert!(limits.check_daily_drawdown(Decimal::new(110_000, 0)));
        assert!(!limits.check_daily_drawdown(Decimal::new(104_000, 0)));
        assert!(limits.daily_drawdown_breached);
    }

    #[test]
    fn roll_day_resets_peak_but_not_a_sticky_breach() {
        let mut limits = limits();
        assert!(!limits.check_daily_drawdown(Decimal::new(90_000, 0)));
        assert!(limits.daily_drawdown_breached);

        limits.roll_day(Decimal::new(90_000, 0));
        assert_eq!(limits.daily_peak_nav, Decimal::new(90_000, 0));
        // still breached: rollover doesn't clear it, only reset_breach does
        assert!(!limits.check_daily_drawdown(Decimal::new(90_000, 0)));
    }

    #[test]
    fn position_size_gate_is_not_sticky() {
        let limits = limits();
        assert!(!limits.check_position_size(Decimal::new(20_000, 0)));
        assert!(limits.check_position_size(Decimal::new(5_000, 0)));
    }

    #[test]
    fn evaluate_runs_gates_in_order() {
        let mut limits = limits();
        let outcome = limits.evaluate(
            Decimal::new(200_000, 0),
            Decimal::new(5_000, 0),
            None,
            Decimal::new(100_000, 0),
        );
        assert_eq!(outcome, RiskGateOutcome::BlockedSingleLoss);
    }

    #[test]
    fn status_reports_peak_and_daily_pnl() {
        let mut limits = limits();
        limits.check_daily_drawdown(Decimal::new(105_000, 0));
        let status = limits.status(Decimal::new(102_000, 0));
        assert_eq!(status.daily_peak_nav, Decimal::new(105_000, 0));
        assert_eq!(status.daily_pnl, Decimal::new(2_000, 0));
        assert!(!status.daily_drawdown_breached);
    }
}
