//! Rate limiting and retry around any gateway
//!
//! A semaphore bounds calls in flight, a shared slot enforces a minimum
//! spacing between call starts, and retryable failures back off
//! exponentially with jitter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::GatewayLimits;
use crate::error::GatewayError;
use crate::gateway::MarketGateway;
use crate::types::{ContractListing, Quote};

/// Exponential backoff with jitter for one logical call
#[derive(Debug)]
pub struct RetryBackoff {
    current: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    remaining: u32,
}

impl RetryBackoff {
    pub fn new(limits: &GatewayLimits) -> Self {
        Self {
            current: Duration::from_millis(limits.retry_base_delay_ms),
            max_delay: Duration::from_millis(limits.retry_max_delay_ms),
            jitter_factor: limits.jitter_factor.clamp(0.0, 1.0),
            remaining: limits.max_retries,
        }
    }

    /// Delay before the next attempt, or `None` when retries are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let base = self.current.min(self.max_delay);
        self.current = (self.current * 2).min(self.max_delay);

        if self.jitter_factor == 0.0 || base.is_zero() {
            return Some(base);
        }
        let jitter = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
        Some(base.mul_f64(1.0 + jitter))
    }
}

/// Gateway wrapper that paces, bounds and retries calls to `inner`
pub struct RateLimitedGateway {
    inner: Arc<dyn MarketGateway>,
    limits: GatewayLimits,
    permits: Semaphore,
    next_slot: Mutex<Instant>,
}

impl RateLimitedGateway {
    pub fn new(inner: Arc<dyn MarketGateway>, limits: GatewayLimits) -> Self {
        let permits = Semaphore::new(limits.max_concurrent.max(1));
        Self {
            inner,
            limits,
            permits,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Wait for this caller's start slot
    async fn pace(&self) {
        let interval = self.limits.min_interval();
        if interval.is_zero() {
            return;
        }
        let mut next = self.next_slot.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep_until(*next).await;
        }
        *next = Instant::now().max(*next) + interval;
    }

    async fn call<T, F, Fut>(&self, op: &'static str, subject: &str, f: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut backoff = RetryBackoff::new(&self.limits);
        let mut attempt = 1u32;

        loop {
            let result = {
                let _permit = self.permits.acquire().await.map_err(|_| GatewayError::Closed)?;
                self.pace().await;
                f().await
            };

            match result {
                Err(e) if e.is_retryable() => match backoff.next_delay() {
                    Some(delay) => {
                        debug!(
                            op,
                            subject,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying gateway call"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        warn!(op, subject, attempts = attempt, error = %e, "Gateway call failed after retries");
                        return Err(e);
                    }
                },
                other => return other,
            }
        }
    }
}

#[async_trait]
impl MarketGateway for RateLimitedGateway {
    async fn spot_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        self.call("spot_price", symbol, || self.inner.spot_price(symbol))
            .await
    }

    async fn call_contracts(&self, underlying: &str) -> Result<Vec<ContractListing>, GatewayError> {
        self.call("call_contracts", underlying, || {
            self.inner.call_contracts(underlying)
        })
        .await
    }

    async fn quote(&self, contract_symbol: &str) -> Result<Quote, GatewayError> {
        self.call("quote", contract_symbol, || self.inner.quote(contract_symbol))
            .await
    }
}
