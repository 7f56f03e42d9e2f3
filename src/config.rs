use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::utils::RetryConfig;

// ============================================================================
// Configuration
// ============================================================================
//
// Loaded from environment variables, falling back to local-development
// defaults for anything unset or unparsable.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub scylla: ScyllaConfig,
    pub redpanda: RedpandaConfig,
    pub publisher: PublisherConfig,
    pub metrics_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScyllaConfig {
    /// Contact points, comma-separated
    pub nodes: Vec<String>,
    pub keyspace: String,
    pub replication_factor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    pub message_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl PublisherConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: 2.0,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            scylla: ScyllaConfig {
                nodes: parsed("SCYLLA_NODES")
                    .map(|v| v.split(',').map(|n| n.trim().to_string()).filter(|n| !n.is_empty()).collect())
                    .unwrap_or_else(|| vec!["127.0.0.1:9042".to_string()]),
                keyspace: parsed("SCYLLA_KEYSPACE").unwrap_or_else(|| "registrations_ks".to_string()),
                replication_factor: parsed("SCYLLA_REPLICATION_FACTOR")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1),
            },
            redpanda: RedpandaConfig {
                brokers: parsed("REDPANDA_BROKERS").unwrap_or_else(|| "127.0.0.1:9092".to_string()),
                message_timeout_ms: parsed("REDPANDA_MESSAGE_TIMEOUT_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            },
            publisher: PublisherConfig {
                max_attempts: parsed("PUBLISH_MAX_ATTEMPTS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
                initial_delay_ms: parsed("PUBLISH_INITIAL_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(50),
                max_delay_ms: parsed("PUBLISH_MAX_DELAY_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30_000),
            },
            metrics_port: parsed("METRICS_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(9090),
        }
    }
}
