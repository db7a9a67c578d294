//! PnL attribution (4.O): decomposes each fill into five additive
//! components — alpha, fee, slippage, impact, rebate — so realised
//! performance can be traced back to signal quality versus execution
//! cost.
//!
//! Alpha is **not** a residual plug figure. It is computed directly as
//! the expected-move term implied by the signal that triggered the
//! trade: `signal_value * |size| * fill_price * horizon_factor`. Fee,
//! slippage, and impact are the realised cost legs (always
//! non-positive from the position-holder's point of view); rebate is
//! the maker credit (non-negative, zero for taker fills). `total` is
//! the sum of all five and is a decomposition of expected trade value,
//! not a recomputation of the fill's actual realised PnL.

use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{OrderType, TradeAttribution};

pub struct PnlAttributor {
    alpha_horizon_factor: f64,
    maker_rebate_bps: f64,
    alpha_threshold_pct: f64,
}

impl PnlAttributor {
    pub fn new(alpha_horizon_factor: f64, maker_rebate_bps: f64, alpha_threshold_pct: f64) -> Self {
        Self {
            alpha_horizon_factor,
            maker_rebate_bps,
            alpha_threshold_pct,
        }
    }

    /// `fee_bps`/`slippage_bps`/`impact_bps` are realised costs in bps
    /// of notional; all are folded into negative Decimal legs here so
    /// `total` reads as net expected value.
    pub fn attribute(
        &self,
        signal_value: f64,
        size: Decimal,
        fill_price: Decimal,
        order_type: OrderType,
        fee_bps: f64,
        slippage_bps: f64,
        impact_bps: f64,
    ) -> TradeAttribution {
        let notional = size.abs() * fill_price;

        let alpha_f64 = signal_value * size.abs().to_string().parse::<f64>().unwrap_or(0.0)
            * fill_price.to_string().parse::<f64>().unwrap_or(0.0)
            * self.alpha_horizon_factor;
        let alpha = Decimal::try_from(alpha_f64).unwrap_or(Decimal::ZERO);

        let bps_to_decimal = |bps: f64| -> Decimal {
            let ratio = Decimal::try_from(bps / 10_000.0).unwrap_or(Decimal::ZERO);
            notional * ratio
        };

        let fee = -bps_to_decimal(fee_bps);
        let slippage = -bps_to_decimal(slippage_bps);
        let impact = -bps_to_decimal(impact_bps);
        let rebate = match order_type {
            OrderType::Limit => bps_to_decimal(self.maker_rebate_bps),
            OrderType::Ioc => Decimal::ZERO,
        };

        let total = alpha + fee + slippage + impact + rebate;

        debug!(
            alpha = %alpha,
            fee = %fee,
            slippage = %slippage,
            impact = %impact,
            rebate = %rebate,
            total = %total,
            "trade_attributed"
        );

        TradeAttribution {
            alpha,
            fee,
            slippage,
            impact,
            rebate,
            total,
        }
    }

    /// `|component| / |total| * 100`. `None` when total is zero —
    /// percentages of a zero-value decomposition are undefined, not 0.
    pub fn component_share_pct(attribution: &TradeAttribution, component: Decimal) -> Option<f64> {
        if attribution.total.is_zero() {
            return None;
        }
        let ratio = (component.abs() / attribution.total.abs())
            .to_string()
            .parse::<f64>()
            .ok()?;
        Some(ratio * 100.0)
    }

    /// Checks whether alpha's share of total attribution is healthy —
    /// `alpha_percentage` (typically from `component_share_pct` against
    /// `attribution.alpha`) should stay above `alpha_threshold_pct`, or
    /// execution cost is eating too much of the signal's expected edge.
    pub fn check_alpha_health(&self, alpha_percentage: f64) -> (bool, String) {
        let healthy = alpha_percentage >= self.alpha_threshold_pct;
        let reason = if healthy {
            format!(
                "alpha share {alpha_percentage:.1}% meets the {:.1}% threshold",
                self.alpha_threshold_pct
            )
        } else {
            format!(
                "alpha share {alpha_percentage:.1}% is below the {:.1}% threshold",
                self.alpha_threshold_pct
            )
        };
        (healthy, reason)
    }
}
