//! Crate-wide error taxonomy.
//!
//! Mirrors the behavioural error kinds from the error handling design:
//! invalid inputs that violate a data-model invariant, adapter failures,
//! and risk breaches. Model degeneracies (zero denominators, empty
//! books) are deliberately **not** represented here — those return
//! defined sentinel values at the call site and never construct an
//! `EngineError`.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A `SignalScore` or similar bounded value was constructed outside
    /// its valid range.
    InvalidSignalValue { value: f64 },
    /// Market data failed to parse into the typed model (wrong shape,
    /// unparsable decimal, side count != 2).
    InvalidMarketData { reason: String },
    /// The execution adapter returned an error or could not be reached.
    AdapterError { reason: String },
    /// A hard-limit check rejected the order.
    RiskBreach { reason: String },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidSignalValue { value } => {
                write!(f, "signal value {value} outside [-1, 1]")
            }
            EngineError::InvalidMarketData { reason } => {
                write!(f, "invalid market data: {reason}")
            }
            EngineError::AdapterError { reason } => write!(f, "adapter error: {reason}"),
            EngineError::RiskBreach { reason } => write!(f, "risk breach: {reason}"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;
