//! Per-symbol signal deduplication (4.E): suppresses signals that are
//! too soon, too similar, already aligned with the open position, or
//! part of a runaway same-direction burst.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{ConfidenceLevel, OrderSide, Position, SignalScore};

#[derive(Debug, Clone)]
struct SymbolDedupState {
    /// The value actually emitted on the last acceptance — already
    /// decayed, not the raw aggregated signal. Change-threshold
    /// comparisons and decay chaining both key off this, not the raw
    /// value, since a run of same-direction accepts is measured
    /// relative to what downstream consumers actually saw.
    last_emitted_value: f64,
    last_accepted_ms: i64,
    same_direction_count: u32,
    last_direction: Option<OrderSide>,
}

impl SymbolDedupState {
    fn fresh() -> Self {
        Self {
            last_emitted_value: 0.0,
            // Far enough in the past that the first-ever signal for a
            // symbol never reads as "within cooldown" of itself.
            last_accepted_ms: i64::MIN,
            same_direction_count: 0,
            last_direction: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DedupDecision {
    /// Carries the emitted signal — on the n-th consecutive
    /// same-direction accept (n >= 2) this is the original signal's
    /// value scaled by `decay_factor^(n-1)`, not the raw value.
    Accept(SignalScore),
    RejectCooldown,
    RejectChangeTooSmall,
    RejectPositionAligned,
    RejectBurstCap,
}

impl DedupDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DedupDecision::Accept(_))
    }

    pub fn into_signal(self) -> Option<SignalScore> {
        match self {
            DedupDecision::Accept(signal) => Some(signal),
            _ => None,
        }
    }
}

pub struct SignalDeduplicator {
    cooldown_ms: i64,
    change_threshold: f64,
    max_same_direction: u32,
    decay: f64,
    state: HashMap<String, SymbolDedupState>,
}

impl SignalDeduplicator {
    pub fn new(cooldown_seconds: f64, change_threshold: f64, max_same_direction: u32, decay: f64) -> Self {
        Self {
            cooldown_ms: (cooldown_seconds * 1000.0) as i64,
            change_threshold,
            max_same_direction,
            decay,
            state: HashMap::new(),
        }
    }

    /// Runs the checks in fixed order: cooldown, change-threshold,
    /// position-alignment, burst-cap. The first failing check rejects;
    /// state is mutated only when the signal is ultimately accepted.
    /// Position-alignment rejects a signal whose direction matches an
    /// already-open position of the same direction, since re-entering
    /// in the same direction is a no-op worth suppressing. On accept,
    /// the emitted value is decayed by `decay_factor^(n-1)` where `n`
    /// is the consecutive same-direction run length, and it is that
    /// decayed value — not the raw signal — that gets stored and
    /// returned.
    pub fn evaluate(
        &mut self,
        symbol: &str,
        signal: &SignalScore,
        position: &Position,
        now_ms: i64,
    ) -> DedupDecision {
        let state = self
            .state
            .entry(symbol.to_string())
            .or_insert_with(SymbolDedupState::fresh);

        if now_ms - state.last_accepted_ms < self.cooldown_ms {
            debug!(symbol, "dedup_reject_cooldown");
            return DedupDecision::RejectCooldown;
        }

        if (signal.value - state.last_emitted_value).abs() < self.change_threshold {
            debug!(symbol, "dedup_reject_change_too_small");
            return DedupDecision::RejectChangeTooSmall;
        }

        let direction = signal.direction();
        if !position.is_flat() {
            let position_direction = if position.is_long() {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            };
            if direction == Some(position_direction) {
                debug!(symbol, "dedup_reject_position_aligned");
                return DedupDecision::RejectPositionAligned;
            }
        }

        let same_direction_count = if direction.is_some() && direction == state.last_direction {
            state.same_direction_count + 1
        } else {
            1
        };
        if same_direction_count > self.max_same_direction {
            debug!(symbol, same_direction_count, "dedup_reject_burst_cap");
            return DedupDecision::RejectBurstCap;
        }

        let decayed_value = signal.value * self.decay.powi((same_direction_count - 1) as i32);
        let emitted = SignalScore {
            value: decayed_value,
            confidence: signal.confidence,
            components: signal.components.clone(),
            timestamp_ms: signal.timestamp_ms,
        };

        state.last_emitted_value = decayed_value;
        state.last_accepted_ms = now_ms;
        state.same_direction_count = same_direction_count;
        state.last_direction = direction;

        debug!(symbol, raw = signal.value, emitted = decayed_value, confidence = ?signal.confidence, "dedup_accept");
        DedupDecision::Accept(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(value: f64, confidence: ConfidenceLevel, ts: i64) -> SignalScore {
        SignalScore::new(value, confidence, vec![0.0, 0.0, 0.0], ts).unwrap()
    }

    #[test]
    fn rejects_within_cooldown() {
        let mut dedup = SignalDeduplicator::new(5.0, 0.15, 3, 0.85);
        let position = Position::flat("BTC");
        let first = score(0.6, ConfidenceLevel::High, 0);
        assert!(dedup.evaluate("BTC", &first, &position, 0).is_accepted());

        let second = score(0.9, ConfidenceLevel::High, 1_000);
        assert!(matches!(
            dedup.evaluate("BTC", &second, &position, 1_000),
            DedupDecision::RejectCooldown
        ));
    }

    #[test]
    fn rejects_small_change_after_cooldown() {
        let mut dedup = SignalDeduplicator::new(1.0, 0.15, 3, 1.0);
        let position = Position::flat("BTC");
        let first = score(0.5, ConfidenceLevel::Medium, 0);
        assert!(dedup.evaluate("BTC", &first, &position, 0).is_accepted());

        let second = score(0.55, ConfidenceLevel::Medium, 2_000);
        assert!(matches!(
            dedup.evaluate("BTC", &second, &position, 2_000),
            DedupDecision::RejectChangeTooSmall
        ));
    }

    #[test]
    fn rejects_when_aligned_with_open_position() {
        let mut dedup = SignalDeduplicator::new(0.0, 0.0, 10, 1.0);
        let mut position = Position::flat("BTC");
        position.size = rust_decimal::Decimal::ONE;
        position.side = Some(crate::types::OrderSide::Buy);

        let aligned = score(0.6, ConfidenceLevel::High, 0);
        assert!(matches!(
            dedup.evaluate("BTC", &aligned, &position, 0),
            DedupDecision::RejectPositionAligned
        ));
    }

    #[test]
    fn rejects_after_burst_cap_exceeded() {
        let mut dedup = SignalDeduplicator::new(0.0, 0.0, 2, 1.0);
        let position = Position::flat("BTC");

        for i in 0..2 {
            let s = score(0.6, ConfidenceLevel::High, i * 100);
            assert!(dedup.evaluate("BTC", &s, &position, i * 100).is_accepted());
        }
        let third = score(0.6, ConfidenceLevel::High, 300);
        assert!(matches!(
            dedup.evaluate("BTC", &third, &position, 300),
            DedupDecision::RejectBurstCap
        ));
    }

    #[test]
    fn first_accept_in_a_run_is_undecayed() {
        let mut dedup = SignalDeduplicator::new(0.0, 0.0, 10, 0.85);
        let position = Position::flat("BTC");
        let s = score(0.6, ConfidenceLevel::High, 0);
        let decision = dedup.evaluate("BTC", &s, &position, 0);
        let emitted = decision.into_signal().unwrap();
        assert!((emitted.value - 0.6).abs() < 1e-9);
    }

    #[test]
    fn consecutive_same_direction_accepts_decay_the_emitted_value() {
        let mut dedup = SignalDeduplicator::new(0.0, 0.0, 10, 0.85);
        let position = Position::flat("BTC");

        let first = score(0.6, ConfidenceLevel::High, 0);
        dedup.evaluate("BTC", &first, &position, 0);

        let second = score(0.6, ConfidenceLevel::High, 100);
        let emitted = dedup.evaluate("BTC", &second, &position, 100).into_signal().unwrap();
        assert!((emitted.value - 0.6 * 0.85).abs() < 1e-9);

        let third = score(0.6, ConfidenceLevel::High, 200);
        let emitted = dedup.evaluate("BTC", &third, &position, 200).into_signal().unwrap();
        assert!((emitted.value - 0.6 * 0.85 * 0.85).abs() < 1e-9);
    }

    #[test]
    fn change_threshold_compares_against_the_emitted_not_raw_value() {
        // decay = 0.5: first accept emits 0.6; the next raw value of 0.3
        // is a no-op relative to the emitted 0.3 (0.6 * 0.5) and must be
        // rejected even though it differs from the *raw* prior value.
        let mut dedup = SignalDeduplicator::new(0.0, 0.05, 10, 0.5);
        let position = Position::flat("BTC");

        let first = score(0.6, ConfidenceLevel::High, 0);
        dedup.evaluate("BTC", &first, &position, 0);

        let second = score(0.3, ConfidenceLevel::High, 100);
        assert!(matches!(
            dedup.evaluate("BTC", &second, &position, 100),
            DedupDecision::RejectChangeTooSmall
        ));
    }
}
