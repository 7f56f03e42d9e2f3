use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::registration::{DomainEvent, RegistrationStage, TicketRegistered};
use crate::metrics::Metrics;
use crate::utils::{retry_with_backoff, RetryConfig, RetryResult};
use super::dead_letter::{DeadLetter, DeadLetterStore};

// ============================================================================
// Registration Event Publisher
// ============================================================================
//
// receive → serialize → publish
//
// The registration pipeline enqueues completed tickets on an in-process,
// unbounded FIFO queue. A single PublisherStage drains it in order, turns each
// event into a JSON document and forwards it to the broker sink with a fixed
// routing key. Publication happens after the ticket is committed and is never
// part of the registration's atomicity boundary: failures here are retried,
// then dead-lettered, and never surface to the registering caller.
//
// ============================================================================

/// Routing key of the registration-completed topic
pub const ROUTING_KEY: &str = "lau-kujawa";

const PUBLISH_OPERATION: &str = "broker_publish";

/// Outbound transport for serialized events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, routing_key: &str, message_key: &str, payload: &str) -> anyhow::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publication queue is closed")]
    QueueClosed,

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },
}

/// What happened to one dequeued event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    DeadLettered,
    Dropped,
}

impl PublishOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::DeadLettered => "dead_lettered",
            Self::Dropped => "dropped",
        }
    }
}

/// Producer side of the hand-off queue; cheap to clone
#[derive(Clone)]
pub struct PublicationQueue {
    sender: mpsc::UnboundedSender<TicketRegistered>,
    metrics: Arc<Metrics>,
}

impl PublicationQueue {
    /// Never blocks; fails only once the publisher stage is gone
    pub fn enqueue(&self, event: TicketRegistered) -> Result<(), PublishError> {
        // Count before sending so the consumer never decrements first
        self.metrics.publication_queue_depth.inc();
        if self.sender.send(event).is_err() {
            self.metrics.publication_queue_depth.dec();
            return Err(PublishError::QueueClosed);
        }
        Ok(())
    }
}

/// Single consumer of the hand-off queue
pub struct PublisherStage {
    receiver: mpsc::UnboundedReceiver<TicketRegistered>,
    sink: Arc<dyn EventSink>,
    dead_letters: Arc<dyn DeadLetterStore>,
    retry_config: RetryConfig,
    metrics: Arc<Metrics>,
}

/// Build the queue and the stage that drains it
pub fn publication_queue(
    sink: Arc<dyn EventSink>,
    dead_letters: Arc<dyn DeadLetterStore>,
    retry_config: RetryConfig,
    metrics: Arc<Metrics>,
) -> (PublicationQueue, PublisherStage) {
    let (sender, receiver) = mpsc::unbounded_channel();

    let queue = PublicationQueue {
        sender,
        metrics: metrics.clone(),
    };
    let stage = PublisherStage {
        receiver,
        sink,
        dead_letters,
        retry_config,
        metrics,
    };

    (queue, stage)
}

impl PublisherStage {
    /// Drain the queue until every `PublicationQueue` handle is dropped
    pub async fn run(mut self) {
        tracing::info!(routing_key = ROUTING_KEY, "📤 Publisher stage started");

        while let Some(event) = self.receiver.recv().await {
            self.metrics.publication_queue_depth.dec();
            self.process(event).await;
        }

        tracing::info!("Publisher stage stopped, queue closed and drained");
    }

    async fn process(&self, event: TicketRegistered) -> PublishOutcome {
        let started = Instant::now();
        let first_attempt_time = Utc::now();

        let outcome = match event.to_document() {
            Ok(payload) => self.publish_with_retry(&event, payload, first_attempt_time).await,
            Err(e) => {
                let error = PublishError::from(e);
                tracing::error!(
                    error = %error,
                    ticket_code = %event.message_key(),
                    "❌ Cannot serialize registration event"
                );
                let payload = format!("{:?}", event);
                self.dead_letter(&event, payload, &error, 0, first_attempt_time).await
            }
        };

        self.metrics
            .record_publication(outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn publish_with_retry(
        &self,
        event: &TicketRegistered,
        payload: String,
        first_attempt_time: chrono::DateTime<Utc>,
    ) -> PublishOutcome {
        let message_key = event.message_key().to_string();

        let result = retry_with_backoff(self.retry_config.clone(), |attempt| {
            let sink = self.sink.clone();
            let metrics = self.metrics.clone();
            let message_key = message_key.clone();
            let payload = payload.clone();

            async move {
                metrics.record_retry_attempt(PUBLISH_OPERATION, attempt);
                sink.publish(ROUTING_KEY, &message_key, &payload).await
            }
        })
        .await;

        match result {
            RetryResult::Success(_) => {
                self.metrics.record_retry_outcome(PUBLISH_OPERATION, true);
                tracing::info!(
                    event_id = %event.event_id(),
                    ticket_code = %message_key,
                    routing_key = ROUTING_KEY,
                    stage = ?RegistrationStage::Published,
                    "✅ Registration event published"
                );
                PublishOutcome::Published
            }
            RetryResult::Failed(e) => {
                self.metrics.record_retry_outcome(PUBLISH_OPERATION, false);
                let error = PublishError::Exhausted {
                    attempts: self.retry_config.max_attempts,
                    message: e.to_string(),
                };
                tracing::error!(
                    error = %error,
                    event_id = %event.event_id(),
                    ticket_code = %message_key,
                    "❌ Failed to publish registration event after retries, sending to DLQ"
                );
                let attempts = self.retry_config.max_attempts as i32;
                self.dead_letter(event, payload, &error, attempts, first_attempt_time).await
            }
        }
    }

    async fn dead_letter(
        &self,
        event: &TicketRegistered,
        payload: String,
        error: &PublishError,
        failure_count: i32,
        first_failed_at: chrono::DateTime<Utc>,
    ) -> PublishOutcome {
        let letter = DeadLetter {
            id: Uuid::new_v4(),
            ticket_code: event.message_key().to_string(),
            event_type: event.event_type().to_string(),
            routing_key: ROUTING_KEY.to_string(),
            payload,
            error_message: error.to_string(),
            failure_count,
            first_failed_at,
        };

        match self.dead_letters.add(letter).await {
            Ok(()) => {
                self.metrics.record_dlq_message(event.event_type());
                PublishOutcome::DeadLettered
            }
            Err(e) => {
                // Ticket is persisted but nobody downstream will hear of it
                tracing::error!(
                    alert = true,
                    error = %e,
                    event_id = %event.event_id(),
                    ticket_code = %event.message_key(),
                    "💀 Registration event lost: DLQ write failed"
                );
                PublishOutcome::Dropped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::registration::{
        Attendee, AttendeeTicket, PricingCategory, TicketCode, TicketPrice, TicketType,
    };
    use crate::messaging::CircuitBreakingSink;
    use crate::storage::memory::{InMemoryDeadLetterStore, RecordingSink};
    use crate::utils::CircuitBreakerConfig;
    use chrono::DateTime;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn event(code: &str) -> TicketRegistered {
        let ticket = AttendeeTicket {
            id: Some(Uuid::new_v4()),
            ticket_code: TicketCode(code.into()),
            attendee: Attendee {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
                phone_number: None,
                title: None,
                company: None,
            },
            ticket_price: TicketPrice {
                ticket_type: TicketType { code: "STANDARD".into(), name: None },
                pricing_category: PricingCategory {
                    code: "EARLY".into(),
                    name: None,
                    valid_from: None,
                    valid_to: None,
                },
                base_price: dec!(100.00),
            },
            discount_code: None,
            net_price: dec!(100.00),
        };
        let received_at = DateTime::parse_from_rfc3339("2024-02-10T09:00:00Z").unwrap();
        TicketRegistered::new(received_at, ticket)
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_publishes_in_enqueue_order_with_fixed_routing_key() {
        let sink = Arc::new(RecordingSink::new());
        let dlq = Arc::new(InMemoryDeadLetterStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let (queue, stage) = publication_queue(sink.clone(), dlq.clone(), fast_retry(), metrics.clone());

        for code in ["T-1", "T-2", "T-3", "T-4"] {
            queue.enqueue(event(code)).unwrap();
        }
        drop(queue);
        stage.run().await;

        let published = sink.published();
        let keys: Vec<&str> = published.iter().map(|m| m.message_key.as_str()).collect();
        assert_eq!(keys, vec!["T-1", "T-2", "T-3", "T-4"]);
        assert!(published.iter().all(|m| m.routing_key == ROUTING_KEY));

        let doc: serde_json::Value = serde_json::from_str(&published[0].payload).unwrap();
        assert_eq!(doc["ticketCode"], "T-1");
        assert_eq!(doc["netPrice"], "100.00");

        assert!(dlq.letters().is_empty());
        assert_eq!(metrics.publication_queue_depth.get(), 0);
    }

    #[tokio::test]
    async fn test_transient_sink_failure_is_retried() {
        let sink = Arc::new(RecordingSink::failing_times(2));
        let dlq = Arc::new(InMemoryDeadLetterStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let (queue, stage) = publication_queue(sink.clone(), dlq.clone(), fast_retry(), metrics);

        queue.enqueue(event("T-1")).unwrap();
        drop(queue);
        stage.run().await;

        assert_eq!(sink.published().len(), 1);
        assert_eq!(sink.attempts(), 3);
        assert!(dlq.letters().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_go_to_dead_letter_queue_and_stage_continues() {
        let sink = Arc::new(RecordingSink::failing_times(3));
        let dlq = Arc::new(InMemoryDeadLetterStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let (queue, stage) = publication_queue(sink.clone(), dlq.clone(), fast_retry(), metrics.clone());

        queue.enqueue(event("T-lost")).unwrap();
        queue.enqueue(event("T-next")).unwrap();
        drop(queue);
        stage.run().await;

        let letters = dlq.letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].ticket_code, "T-lost");
        assert_eq!(letters[0].routing_key, ROUTING_KEY);
        assert_eq!(letters[0].failure_count, 3);

        let published = sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].message_key, "T-next");
        assert_eq!(metrics.dlq_messages_total.get(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_fails_once_stage_is_gone() {
        let sink = Arc::new(RecordingSink::new());
        let dlq = Arc::new(InMemoryDeadLetterStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let (queue, stage) = publication_queue(sink, dlq, fast_retry(), metrics.clone());
        drop(stage);

        assert!(matches!(queue.enqueue(event("T-1")), Err(PublishError::QueueClosed)));
        assert_eq!(metrics.publication_queue_depth.get(), 0);
    }

    #[tokio::test]
    async fn test_failed_dead_letter_write_drops_event_and_stage_continues() {
        let sink = Arc::new(RecordingSink::failing_times(3));
        let dlq = Arc::new(InMemoryDeadLetterStore::failing());
        let metrics = Arc::new(Metrics::new().unwrap());
        let (queue, stage) = publication_queue(sink.clone(), dlq.clone(), fast_retry(), metrics.clone());

        queue.enqueue(event("T-lost")).unwrap();
        queue.enqueue(event("T-next")).unwrap();
        drop(queue);
        stage.run().await;

        let published = sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].message_key, "T-next");
        assert!(dlq.letters().is_empty());

        assert_eq!(metrics.publications_total.with_label_values(&["dropped"]).get(), 1);
        assert_eq!(metrics.publications_total.with_label_values(&["published"]).get(), 1);
        assert_eq!(metrics.dlq_messages_total.get(), 0);
    }

    fn quick_breaker(failure_threshold: u32) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            timeout: Duration::from_millis(50),
            success_threshold: 1,
        }
    }

    #[tokio::test]
    async fn test_short_outage_is_ridden_out_by_waiting_on_the_breaker() {
        // Outage opens the circuit on the second attempt; the third waits it out
        let broker = Arc::new(RecordingSink::failing_times(2));
        let metrics = Arc::new(Metrics::new().unwrap());
        let sink = Arc::new(CircuitBreakingSink::new(broker.clone(), quick_breaker(2), metrics.clone()));
        let dlq = Arc::new(InMemoryDeadLetterStore::new());
        let (queue, stage) = publication_queue(sink, dlq.clone(), fast_retry(), metrics);

        queue.enqueue(event("T-1")).unwrap();
        drop(queue);
        stage.run().await;

        assert!(dlq.letters().is_empty());
        assert_eq!(broker.attempts(), 3);
        assert_eq!(broker.published()[0].message_key, "T-1");
    }

    #[tokio::test]
    async fn test_event_after_outage_reaches_recovered_broker() {
        let broker = Arc::new(RecordingSink::failing_times(3));
        let metrics = Arc::new(Metrics::new().unwrap());
        let sink = Arc::new(CircuitBreakingSink::new(broker.clone(), quick_breaker(3), metrics.clone()));
        let dlq = Arc::new(InMemoryDeadLetterStore::new());
        let (queue, stage) = publication_queue(sink, dlq.clone(), fast_retry(), metrics);

        queue.enqueue(event("T-lost")).unwrap();
        queue.enqueue(event("T-next")).unwrap();
        drop(queue);
        stage.run().await;

        let letters = dlq.letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].ticket_code, "T-lost");

        // Open circuit was waited out, not counted as three more failures
        assert_eq!(broker.attempts(), 4);
        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].message_key, "T-next");
    }
}
