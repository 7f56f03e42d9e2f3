// ============================================================================
// Registration Domain - Attendee registration and ticket pricing
// ============================================================================
//
// This module contains ALL registration-specific code:
// - Value objects (Attendee, TicketPrice, DiscountCode, AttendeeTicket, ...)
// - Errors (RegistrationError, StorageError)
// - Repository contracts for reference data and the ticket store
// - Pricing resolver (ticket type + receipt date → price)
// - Unit of work (scoped, all-or-nothing ticket write)
// - Registration pipeline (the orchestrator)
// - Events (TicketRegistered, published after commit)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod repositories;
pub mod pricing;
pub mod unit_of_work;
pub mod pipeline;
pub mod events;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use repositories::*;
pub use pricing::*;
pub use pipeline::*;
pub use events::*;
