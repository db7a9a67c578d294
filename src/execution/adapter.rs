//! Venue-agnostic execution adapter trait and the in-tree paper
//! simulator used for local runs and tests. The live venue wire client
//! is an out-of-scope external collaborator; nothing in this crate
//! implements one.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::sync::Mutex;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::types::{OrderSide, OrderType};

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Decimal,
    pub order_type: OrderType,
    pub post_only: bool,
}

#[derive(Debug, Clone)]
pub enum AdapterOrderStatus {
    Resting,
    Filled { filled_size: Decimal },
    Rejected { reason: String },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: String,
    pub status: AdapterOrderStatus,
}

/// The three capabilities the core requires from a venue: place, query
/// status, and cancel, keyed by order id.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    async fn place_order(&self, request: OrderRequest) -> EngineResult<OrderAck>;
    async fn order_status(&self, order_id: &str) -> EngineResult<AdapterOrderStatus>;
    async fn cancel_order(&self, order_id: &str) -> EngineResult<()>;
}

#[derive(Debug, Clone)]
pub struct PaperExecutionConfig {
    pub ioc_fill_probability: f64,
    pub limit_fill_probability: f64,
    pub simulated_latency_ms: u64,
    pub seed: u64,
}

impl Default for PaperExecutionConfig {
    fn default() -> Self {
        Self {
            ioc_fill_probability: 0.95,
            limit_fill_probability: 0.70,
            simulated_latency_ms: 5,
            seed: 42,
        }
    }
}

struct PendingOrder {
    request: OrderRequest,
    status: AdapterOrderStatus,
}

/// Deterministic-enough simulator: fill probability by order type,
/// simulated latency, and an RNG seeded for reproducible test/CI runs.
/// Resting LIMIT orders remain `Resting` until `order_status` is polled,
/// at which point the fill/no-fill coin flip resolves once and is
/// memoised, matching a real venue's "ask again, get the same answer"
/// semantics.
pub struct PaperExecutionAdapter {
    config: PaperExecutionConfig,
    rng: Mutex<StdRng>,
    orders: Mutex<std::collections::HashMap<String, PendingOrder>>,
}

impl PaperExecutionAdapter {
    pub fn new(config: PaperExecutionConfig) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            config,
            orders: Mutex::new(std::collections::HashMap::new()),
        }
    }
}

#[async_trait]
impl ExecutionAdapter for PaperExecutionAdapter {
    async fn place_order(&self, request: OrderRequest) -> EngineResult<OrderAck> {
        sleep(Duration::from_millis(self.config.simulated_latency_ms)).await;

        let order_id = Uuid::new_v4().to_string();
        let fill_probability = match request.order_type {
            OrderType::Ioc => self.config.ioc_fill_probability,
            OrderType::Limit => self.config.limit_fill_probability,
        };

        let roll: f64 = {
            let mut rng = self.rng.lock().map_err(|_| EngineError::AdapterError {
                reason: "paper adapter rng poisoned".to_string(),
            })?;
            rng.gen()
        };

        let status = if roll <= fill_probability {
            AdapterOrderStatus::Filled {
                filled_size: request.size,
            }
        } else if request.order_type == OrderType::Ioc {
            // An IOC that doesn't fill is cancelled outright, never left resting.
            AdapterOrderStatus::Cancelled
        } else {
            AdapterOrderStatus::Resting
        };

        self.orders
            .lock()
            .map_err(|_| EngineError::AdapterError {
                reason: "paper adapter orders map poisoned".to_string(),
            })?
            .insert(
                order_id.clone(),
                PendingOrder {
                    request,
                    status: status.clone(),
                },
            );

        Ok(OrderAck { order_id, status })
    }

    async fn order_status(&self, order_id: &str) -> EngineResult<AdapterOrderStatus> {
        let mut orders = self.orders.lock().map_err(|_| EngineError::AdapterError {
            reason: "paper adapter orders map poisoned".to_string(),
        })?;
        let Some(pending) = orders.get_mut(order_id) else {
            return Err(EngineError::AdapterError {
                reason: format!("unknown order id {order_id}"),
            });
        };

        if matches!(pending.status, AdapterOrderStatus::Resting) {
            let roll: f64 = {
                let mut rng = self.rng.lock().map_err(|_| EngineError::AdapterError {
                    reason: "paper adapter rng poisoned".to_string(),
                })?;
                rng.gen()
            };
            // Give a resting maker order another independent chance to
            // fill on each poll, capped by its configured probability.
            if roll <= self.config.limit_fill_probability {
                pending.status = AdapterOrderStatus::Filled {
                    filled_size: pending.request.size,
                };
            }
        }

        Ok(pending.status.clone())
    }

    async fn cancel_order(&self, order_id: &str) -> EngineResult<()> {
        let mut orders = self.orders.lock().map_err(|_| EngineError::AdapterError {
            reason: "paper adapter orders map poisoned".to_string(),
        })?;
        if let Some(pending) = orders.get_mut(order_id) {
            if !matches!(pending.status, AdapterOrderStatus::Filled { .. }) {
                pending.status = AdapterOrderStatus::Cancelled;
            }
        }
        Ok(())
    }
}

/// A stub used by unit tests that need to assert on call sequencing
/// without a real fill/timeout simulation.
pub struct NullExecutionAdapter;

#[async_trait]
impl ExecutionAdapter for NullExecutionAdapter {
    async fn place_order(&self, _request: OrderRequest) -> EngineResult<OrderAck> {
        Ok(OrderAck {
            order_id: Uuid::new_v4().to_string(),
            status: AdapterOrderStatus::Rejected {
                reason: "null adapter never fills".to_string(),
            },
        })
    }

    async fn order_status(&self, _order_id: &str) -> EngineResult<AdapterOrderStatus> {
        Ok(AdapterOrderStatus::Cancelled)
    }

    async fn cancel_order(&self, _order_id: &str) -> EngineResult<()> {
        Ok(())
    }
}
