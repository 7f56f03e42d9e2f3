use chrono::NaiveDate;

// ============================================================================
// Registration Errors
// ============================================================================
//
// Every failure aborts the unit of work before anything is persisted or
// published. Publication faults are not listed here: they happen after commit
// and are handled inside the publisher stage.
//
// ============================================================================

/// Broad classification used by callers to decide who is at fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client sent data we cannot accept
    InvalidInput,
    /// Reference data (pricing categories, prices) is misconfigured
    ReferenceData,
    /// Storage failed while reading or writing
    Persistence,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Invalid ticket type: {0}")]
    InvalidTicketType(String),

    #[error("Required field is blank: {0}")]
    MissingField(&'static str),

    #[error("Cannot determine pricing category for {0}: no date match and no fallback category")]
    MissingPricingCategory(NaiveDate),

    #[error("Ambiguous pricing category for {date}: {codes:?} all match")]
    AmbiguousPricingCategory { date: NaiveDate, codes: Vec<String> },

    #[error("Cannot determine ticket price for ticket type '{ticket_type}' and pricing category '{pricing_category}'")]
    MissingTicketPrice {
        ticket_type: String,
        pricing_category: String,
    },

    #[error("Reference data lookup failed: {0}")]
    Repository(#[source] StorageError),

    #[error("Failed to persist attendee ticket: {0}")]
    Persistence(#[source] StorageError),
}

impl RegistrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTicketType(_) | Self::MissingField(_) => ErrorKind::InvalidInput,
            Self::MissingPricingCategory(_)
            | Self::AmbiguousPricingCategory { .. }
            | Self::MissingTicketPrice { .. } => ErrorKind::ReferenceData,
            Self::Repository(_) | Self::Persistence(_) => ErrorKind::Persistence,
        }
    }

    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ReferenceData => "reference_data_fault",
            ErrorKind::Persistence => "persistence_fault",
        }
    }
}

/// Failure reported by a storage adapter
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Ticket code already exists: {0}")]
    DuplicateTicketCode(String),

    #[error("Corrupt stored value in {column}: {value}")]
    CorruptValue { column: &'static str, value: String },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
