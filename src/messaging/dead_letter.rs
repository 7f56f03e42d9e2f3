use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

// ============================================================================
// Dead Letter Queue
// ============================================================================
//
// Holds registration events that could not be published after all retry
// attempts. The ticket behind each entry is already persisted; the entry keeps
// the exact payload and routing key that failed.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub id: Uuid,
    pub ticket_code: String,
    pub event_type: String,
    pub routing_key: String,
    pub payload: String,
    pub error_message: String,
    pub failure_count: i32,
    pub first_failed_at: DateTime<Utc>,
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn add(&self, letter: DeadLetter) -> anyhow::Result<()>;
}
