//! Weighted-sum aggregation of the signal primitives into a single
//! confidence-tiered `SignalScore`.

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::signals::impact::ImpactSignal;
use crate::signals::microprice::MicropriceSignal;
use crate::signals::obi::ObiSignal;
use crate::types::{ConfidenceLevel, MarketData, SignalScore};

pub struct SignalAggregator {
    obi: ObiSignal,
    microprice: MicropriceSignal,
    impact: ImpactSignal,
    theta_high: f64,
    theta_medium: f64,
}

impl SignalAggregator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            obi: ObiSignal::new(config.obi_depth, true, config.signal_weights.obi),
            microprice: MicropriceSignal::new(
                config.microprice_scale,
                config.signal_weights.microprice,
            ),
            impact: ImpactSignal::new(config.impact_window_ms, config.signal_weights.impact),
            theta_high: config.theta_high,
            theta_medium: config.theta_medium,
        }
    }

    /// Computes each primitive, takes the weight-normalised sum (weights
    /// are defensively renormalised in case they don't sum to exactly
    /// 1), clamps to `[-1, 1]`, and classifies confidence. Components
    /// are preserved in fixed input order: `[obi, microprice, impact]`.
    pub fn aggregate(&self, market_data: &MarketData, now_ms: i64) -> EngineResult<SignalScore> {
        let obi_value = self.obi.compute(market_data);
        let microprice_value = self.microprice.compute(market_data);
        let impact_value = self.impact.compute(market_data);

        let weight_sum = self.obi.weight + self.microprice.weight + self.impact.weight;
        let normaliser = if weight_sum.abs() > f64::EPSILON {
            1.0 / weight_sum
        } else {
            0.0
        };

        let raw = obi_value * self.obi.weight
            + microprice_value * self.microprice.weight
            + impact_value * self.impact.weight;
        let value = (raw * normaliser).clamp(-1.0, 1.0);

        let confidence = self.classify(value);

        debug!(
            symbol = %market_data.symbol,
            obi = obi_value,
            microprice = microprice_value,
            impact = impact_value,
            aggregated = value,
            ?confidence,
            "signal_aggregated"
        );

        SignalScore::new(
            value,
            confidence,
            vec![obi_value, microprice_value, impact_value],
            now_ms,
        )
    }

    fn classify(&self, value: f64) -> ConfidenceLevel {
        let abs = value.abs();
        if abs > self.theta_high {
            ConfidenceLevel::High
        } else if abs > self.theta_medium {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}
