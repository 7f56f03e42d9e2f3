use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

use super::errors::RegistrationError;
use crate::models::AttendeeRegistration;

// ============================================================================
// Registration Value Objects
// ============================================================================

/// Code of the pricing category used when no date-specific category applies
pub const FALLBACK_PRICING_CATEGORY: &str = "L";

/// Trim a free-text field, mapping blank input to `None`
pub fn trim_to_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(value: &str, field: &'static str) -> Result<String, RegistrationError> {
    trim_to_none(Some(value)).ok_or(RegistrationError::MissingField(field))
}

/// Person holding a ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
}

impl Attendee {
    /// Build an attendee from a registration, normalizing optional text fields
    pub fn from_registration(registration: &AttendeeRegistration) -> Result<Self, RegistrationError> {
        Ok(Self {
            first_name: required(&registration.first_name, "firstName")?,
            last_name: required(&registration.last_name, "lastName")?,
            email: required(&registration.email, "email")?,
            phone_number: trim_to_none(registration.phone_number.as_deref()),
            title: trim_to_none(registration.title.as_deref()),
            company: trim_to_none(registration.company.as_deref()),
        })
    }
}

/// Category of admission (e.g. STANDARD, VIP)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    pub code: String,
    pub name: Option<String>,
}

/// Date-scoped pricing tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingCategory {
    pub code: String,
    pub name: Option<String>,
    /// Inclusive lower bound, open when absent
    pub valid_from: Option<NaiveDate>,
    /// Inclusive upper bound, open when absent
    pub valid_to: Option<NaiveDate>,
}

impl PricingCategory {
    /// A category without any bound (such as the fallback) never matches by date
    pub fn is_date_specific(&self) -> bool {
        self.valid_from.is_some() || self.valid_to.is_some()
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.is_date_specific()
            && self.valid_from.map_or(true, |from| from <= date)
            && self.valid_to.map_or(true, |to| date <= to)
    }
}

/// Base price of one (ticket type, pricing category) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPrice {
    pub ticket_type: TicketType,
    pub pricing_category: PricingCategory,
    pub base_price: Decimal,
}

/// Token entitling a flat reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub code: String,
    pub amount: Decimal,
}

/// Globally unique ticket identifier handed to the attendee
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketCode(pub String);

impl TicketCode {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TicketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Priced, ticketed registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeTicket {
    /// Assigned by the store on save
    pub id: Option<Uuid>,
    pub ticket_code: TicketCode,
    pub attendee: Attendee,
    pub ticket_price: TicketPrice,
    pub discount_code: Option<DiscountCode>,
    pub net_price: Decimal,
}

/// Net price after discount, never below zero.
/// Returns the price and whether it had to be clamped.
pub fn net_price(base_price: Decimal, discount: Option<&DiscountCode>) -> (Decimal, bool) {
    let amount = discount.map(|d| d.amount).unwrap_or(Decimal::ZERO);
    let net = base_price - amount;
    if net.is_sign_negative() && !net.is_zero() {
        (Decimal::ZERO, true)
    } else {
        (net, false)
    }
}

/// Progress of a single registration through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStage {
    Received,
    Validated,
    Priced,
    Discounted,
    Persisted,
    Published,
    Failed,
}
