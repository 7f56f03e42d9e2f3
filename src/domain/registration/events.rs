use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, FixedOffset, Utc};

use super::value_objects::AttendeeTicket;

// ============================================================================
// Registration Events
// ============================================================================

/// Base trait for events leaving the service
pub trait DomainEvent {
    fn event_type(&self) -> &str;
    fn event_id(&self) -> Uuid;
    /// Key used to partition the event on the broker
    fn message_key(&self) -> &str;
}

/// Emitted once a ticket has been durably persisted
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketRegistered {
    pub event_id: Uuid,
    pub received_at: DateTime<FixedOffset>,
    pub registered_at: DateTime<Utc>,
    #[serde(flatten)]
    pub ticket: AttendeeTicket,
}

impl TicketRegistered {
    pub fn new(received_at: DateTime<FixedOffset>, ticket: AttendeeTicket) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            received_at,
            registered_at: Utc::now(),
            ticket,
        }
    }

    /// JSON document published to the broker
    pub fn to_document(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl DomainEvent for TicketRegistered {
    fn event_type(&self) -> &str {
        "TicketRegistered"
    }

    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn message_key(&self) -> &str {
        self.ticket.ticket_code.as_str()
    }
}
