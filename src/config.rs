//! Engine-wide configuration, loaded once at construction.
//!
//! Follows the teacher's `Config::from_env()` idiom: every field is
//! read via `std::env::var(..).ok().and_then(|v| v.parse().ok())` with
//! an explicit fallback, so a malformed environment variable degrades
//! to the documented default instead of panicking. No field is ever
//! implicitly defaulted at the call site — `EngineConfig::default()`
//! and `EngineConfig::from_env()` are the only two places defaults
//! live.

use rust_decimal::Decimal;
use std::str::FromStr;

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    std::env::var(key)
        .ok()
        .and_then(|v| Decimal::from_str(&v).ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct SignalWeights {
    pub obi: f64,
    pub microprice: f64,
    pub impact: f64,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            obi: 0.4,
            microprice: 0.35,
            impact: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbols: Vec<String>,
    pub initial_nav: Decimal,

    // Signal aggregator
    pub signal_weights: SignalWeights,
    pub theta_high: f64,
    pub theta_medium: f64,
    pub obi_depth: usize,
    pub microprice_scale: f64,
    pub impact_window_ms: i64,

    // Slippage estimator
    pub max_slippage_bps: f64,

    // Deduplicator
    pub dedup_cooldown_sec: f64,
    pub dedup_change_threshold: f64,
    pub dedup_decay_factor: f64,
    pub dedup_max_same_direction: u32,

    // IOC executor
    pub ioc_default_size: Decimal,
    pub ioc_adj_bps: f64,

    // Shallow maker executor
    pub maker_default_size: Decimal,
    pub maker_tick_offset: Decimal,
    pub maker_timeout_high_sec: f64,
    pub maker_timeout_medium_sec: f64,
    pub maker_use_post_only: bool,
    pub maker_poll_interval_ms: u64,

    // Router
    pub router_enable_fallback: bool,
    pub router_fallback_on_medium: bool,

    // TP/SL
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,

    // Position closer
    pub max_position_age_seconds: f64,

    // Hard limits
    pub max_single_loss_pct: Decimal,
    pub max_daily_drawdown_pct: Decimal,
    pub max_position_size_usd: Decimal,
    pub fallback_slippage_pct: Decimal,

    // Cost model
    pub maker_fee_rate: Decimal,
    pub taker_fee_rate: Decimal,
    pub impact_alpha: f64,
    pub maker_rebate_bps: f64,

    // Attribution
    pub alpha_horizon_factor: f64,
    pub alpha_threshold_pct: f64,

    // Engine loop
    pub tick_period_ms: u64,

    // Observability / adapter
    pub dry_run: bool,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC".to_string()],
            initial_nav: Decimal::new(100_000, 0),

            signal_weights: SignalWeights::default(),
            theta_high: 0.5,
            theta_medium: 0.2,
            obi_depth: 5,
            microprice_scale: 100.0,
            impact_window_ms: 5_000,

            max_slippage_bps: 20.0,

            dedup_cooldown_sec: 5.0,
            dedup_change_threshold: 0.15,
            dedup_decay_factor: 0.85,
            dedup_max_same_direction: 3,

            ioc_default_size: Decimal::new(1, 2), // 0.01
            ioc_adj_bps: 10.0,

            maker_default_size: Decimal::new(1, 2), // 0.01
            maker_tick_offset: Decimal::new(1, 1),  // 0.1
            maker_timeout_high_sec: 5.0,
            maker_timeout_medium_sec: 3.0,
            maker_use_post_only: true,
            maker_poll_interval_ms: 100,

            router_enable_fallback: true,
            router_fallback_on_medium: false,

            take_profit_pct: Decimal::new(2, 2), // 0.02
            stop_loss_pct: Decimal::new(1, 2),    // 0.01

            max_position_age_seconds: 1800.0,

            max_single_loss_pct: Decimal::new(8, 3),  // 0.008
            max_daily_drawdown_pct: Decimal::new(5, 2), // 0.05
            max_position_size_usd: Decimal::new(10_000, 0),
            fallback_slippage_pct: Decimal::new(1, 2), // 0.01

            maker_fee_rate: Decimal::new(15, 5),  // 0.00015
            taker_fee_rate: Decimal::new(45, 5),  // 0.00045
            impact_alpha: 0.01,
            maker_rebate_bps: 1.5,

            alpha_horizon_factor: 1.0,
            alpha_threshold_pct: 70.0,

            tick_period_ms: 100,

            dry_run: true,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        let symbols = std::env::var("EDGECORE_SYMBOLS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or(default.symbols);

        Self {
            symbols,
            initial_nav: env_decimal("EDGECORE_INITIAL_NAV", default.initial_nav),

            signal_weights: SignalWeights {
                obi: env_parse("EDGECORE_WEIGHT_OBI", default.signal_weights.obi),
                microprice: env_parse(
                    "EDGECORE_WEIGHT_MICROPRICE",
                    default.signal_weights.microprice,
                ),
                impact: env_parse("EDGECORE_WEIGHT_IMPACT", default.signal_weights.impact),
            },
            theta_high: env_parse("EDGECORE_THETA_HIGH", default.theta_high),
            theta_medium: env_parse("EDGECORE_THETA_MEDIUM", default.theta_medium),
            obi_depth: env_parse("EDGECORE_OBI_DEPTH", default.obi_depth),
            microprice_scale: env_parse("EDGECORE_MICROPRICE_SCALE", default.microprice_scale),
            impact_window_ms: env_parse("EDGECORE_IMPACT_WINDOW_MS", default.impact_window_ms),

            max_slippage_bps: env_parse("EDGECORE_MAX_SLIPPAGE_BPS", default.max_slippage_bps),

            dedup_cooldown_sec: env_parse("EDGECORE_DEDUP_COOLDOWN_SEC", default.dedup_cooldown_sec),
            dedup_change_threshold: env_parse(
                "EDGECORE_DEDUP_CHANGE_THRESHOLD",
                default.dedup_change_threshold,
            ),
            dedup_decay_factor: env_parse("EDGECORE_DEDUP_DECAY_FACTOR", default.dedup_decay_factor),
            dedup_max_same_direction: env_parse(
                "EDGECORE_DEDUP_MAX_SAME_DIRECTION",
                default.dedup_max_same_direction,
            ),

            ioc_default_size: env_decimal("EDGECORE_IOC_DEFAULT_SIZE", default.ioc_default_size),
            ioc_adj_bps: env_parse("EDGECORE_IOC_ADJ_BPS", default.ioc_adj_bps),

            maker_default_size: env_decimal(
                "EDGECORE_MAKER_DEFAULT_SIZE",
                default.maker_default_size,
            ),
            maker_tick_offset: env_decimal("EDGECORE_MAKER_TICK_OFFSET", default.maker_tick_offset),
            maker_timeout_high_sec: env_parse(
                "EDGECORE_MAKER_TIMEOUT_HIGH_SEC",
                default.maker_timeout_high_sec,
            ),
            maker_timeout_medium_sec: env_parse(
                "EDGECORE_MAKER_TIMEOUT_MEDIUM_SEC",
                default.maker_timeout_medium_sec,
            ),
            maker_use_post_only: env_parse(
                "EDGECORE_MAKER_USE_POST_ONLY",
                default.maker_use_post_only,
            ),
            maker_poll_interval_ms: env_parse(
                "EDGECORE_MAKER_POLL_INTERVAL_MS",
                default.maker_poll_interval_ms,
            ),

            router_enable_fallback: env_parse(
                "EDGECORE_ROUTER_ENABLE_FALLBACK",
                default.router_enable_fallback,
            ),
            router_fallback_on_medium: env_parse(
                "EDGECORE_ROUTER_FALLBACK_ON_MEDIUM",
                default.router_fallback_on_medium,
            ),

            take_profit_pct: env_decimal("EDGECORE_TAKE_PROFIT_PCT", default.take_profit_pct),
            stop_loss_pct: env_decimal("EDGECORE_STOP_LOSS_PCT", default.stop_loss_pct),

            max_position_age_seconds: env_parse(
                "EDGECORE_MAX_POSITION_AGE_SECONDS",
                default.max_position_age_seconds,
            ),

            max_single_loss_pct: env_decimal(
                "EDGECORE_MAX_SINGLE_LOSS_PCT",
                default.max_single_loss_pct,
            ),
            max_daily_drawdown_pct: env_decimal(
                "EDGECORE_MAX_DAILY_DRAWDOWN_PCT",
                default.max_daily_drawdown_pct,
            ),
            max_position_size_usd: env_decimal(
                "EDGECORE_MAX_POSITION_SIZE_USD",
                default.max_position_size_usd,
            ),
            fallback_slippage_pct: env_decimal(
                "EDGECORE_FALLBACK_SLIPPAGE_PCT",
                default.fallback_slippage_pct,
            ),

            maker_fee_rate: env_decimal("EDGECORE_MAKER_FEE_RATE", default.maker_fee_rate),
            taker_fee_rate: env_decimal("EDGECORE_TAKER_FEE_RATE", default.taker_fee_rate),
            impact_alpha: env_parse("EDGECORE_IMPACT_ALPHA", default.impact_alpha),
            maker_rebate_bps: env_parse("EDGECORE_MAKER_REBATE_BPS", default.maker_rebate_bps),

            alpha_horizon_factor: env_parse(
                "EDGECORE_ALPHA_HORIZON_FACTOR",
                default.alpha_horizon_factor,
            ),
            alpha_threshold_pct: env_parse(
                "EDGECORE_ALPHA_THRESHOLD_PCT",
                default.alpha_threshold_pct,
            ),

            tick_period_ms: env_parse("EDGECORE_TICK_PERIOD_MS", default.tick_period_ms),

            dry_run: env_parse("EDGECORE_DRY_RUN", default.dry_run),
            log_filter: std::env::var("RUST_LOG").unwrap_or(default.log_filter),
        }
    }
}
