use rdkafka::{
    producer::{FutureProducer, FutureRecord},
    config::ClientConfig,
};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::config::RedpandaConfig;
use crate::utils::CircuitBreakerConfig;
use super::publisher::EventSink;

pub struct RedpandaClient {
    producer: FutureProducer,
    send_timeout: Duration,
}

impl RedpandaClient {
    pub fn new(config: &RedpandaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", config.message_timeout_ms.to_string())
            .set("enable.idempotence", "true")
            .create()
            .map_err(|e| anyhow::anyhow!("Failed to create Redpanda producer: {}", e))?;

        Ok(Self {
            producer,
            send_timeout: Duration::from_millis(config.message_timeout_ms),
        })
    }

    /// Circuit breaker settings for the Redpanda path
    pub fn circuit_breaker_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 5,           // Open after 5 failures
            timeout: Duration::from_secs(30),  // Wait 30s before probing again
            success_threshold: 3,           // Need 3 successes to close
        }
    }

    async fn send(&self, topic: &str, key: &str, payload: &str) -> Result<()> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self
            .producer
            .send(record, rdkafka::util::Timeout::After(self.send_timeout))
            .await
        {
            Ok(_) => {
                tracing::info!(
                    topic = %topic,
                    key = %key,
                    "Published to Redpanda"
                );
                Ok(())
            }
            Err((e, _)) => {
                tracing::error!(
                    error = %e,
                    topic = %topic,
                    "Failed to publish to Redpanda"
                );
                Err(anyhow::anyhow!("Kafka send error: {}", e))
            }
        }
    }
}

#[async_trait]
impl EventSink for RedpandaClient {
    /// The routing key is the Kafka topic; the message key partitions within it
    async fn publish(&self, routing_key: &str, message_key: &str, payload: &str) -> Result<()> {
        self.send(routing_key, message_key, payload).await
    }
}
