use serde::{Deserialize, Serialize};
use chrono::{DateTime, FixedOffset};

// ============================================================================
// Inbound Models
// ============================================================================
//
// Wire types for registrations arriving from intake. They are immutable once
// received; the domain layer builds its own types from them.
//
// ============================================================================

/// Attendee registration payload as submitted by the client
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub ticket_type: String,
    #[serde(default)]
    pub discount_code: Option<String>,
}

/// A registration together with the moment it was received
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    /// ISO-8601 date-time with offset; pricing uses the date in this offset
    pub received_at: DateTime<FixedOffset>,
    pub registration: AttendeeRegistration,
}
