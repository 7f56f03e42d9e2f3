use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::sleep;

use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitState};
use super::publisher::EventSink;

// ============================================================================
// Circuit-Breaking Sink
// ============================================================================
//
// Wraps the broker sink with a circuit breaker. While the circuit is open a
// publish waits until the breaker allows a trial request instead of failing
// fast, so an outage stalls the queue rather than draining it into the DLQ.
// Only real broker failures count against the publisher's retry budget.
//
// ============================================================================

pub struct CircuitBreakingSink {
    inner: Arc<dyn EventSink>,
    breaker: CircuitBreaker,
    metrics: Arc<Metrics>,
}

impl CircuitBreakingSink {
    pub fn new(inner: Arc<dyn EventSink>, config: CircuitBreakerConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(config),
            metrics,
        }
    }

    async fn record_state(&self) {
        let state = self.breaker.get_state().await;
        self.metrics.update_circuit_breaker_state(match state {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        });
    }
}

#[async_trait]
impl EventSink for CircuitBreakingSink {
    async fn publish(&self, routing_key: &str, message_key: &str, payload: &str) -> anyhow::Result<()> {
        loop {
            if let Some(wait) = self.breaker.open_remaining().await {
                if !wait.is_zero() {
                    tracing::warn!(
                        routing_key = %routing_key,
                        message_key = %message_key,
                        wait_ms = wait.as_millis() as u64,
                        "Circuit breaker open, holding publication until the broker can be probed"
                    );
                    sleep(wait).await;
                }
            }

            let result = self
                .breaker
                .call(self.inner.publish(routing_key, message_key, payload))
                .await;
            self.record_state().await;

            match result {
                Ok(()) => return Ok(()),
                // Reopened between the wait and the call
                Err(CircuitBreakerError::CircuitOpen) => continue,
                Err(CircuitBreakerError::OperationFailed(e)) => return Err(e),
            }
        }
    }
}
