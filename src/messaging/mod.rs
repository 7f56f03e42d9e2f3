// ============================================================================
// Messaging - outbound path to the broker
// ============================================================================

mod dead_letter;
mod guarded_sink;
mod publisher;
mod redpanda;

pub use dead_letter::{DeadLetter, DeadLetterStore};
pub use guarded_sink::CircuitBreakingSink;
pub use publisher::{publication_queue, EventSink, PublicationQueue, ROUTING_KEY};
#[cfg(test)]
pub use publisher::PublisherStage;
pub use redpanda::RedpandaClient;
