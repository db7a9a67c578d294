//! edgecore: the real-time trading loop and its supporting subsystems
//! for a perpetual-futures market-making / short-horizon alpha engine.
//!
//! Exposes every core module for use by the wiring binary and the
//! integration tests under `tests/`.

pub mod attribution;
pub mod book;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod market_data;
pub mod risk;
pub mod signals;
pub mod types;

pub use config::EngineConfig;
pub use engine::{EngineStopFlag, TradingEngine};
pub use error::{EngineError, EngineResult};
