use async_trait::async_trait;
use chrono::NaiveDate;

use super::errors::StorageError;
use super::value_objects::{AttendeeTicket, DiscountCode, PricingCategory, TicketPrice, TicketType};

// ============================================================================
// Repository Contracts
// ============================================================================
//
// Reference data repositories are read-only from the pipeline's point of
// view. The ticket store is the only write path.
//
// ============================================================================

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait TicketTypeRepository: Send + Sync {
    async fn find_by_code(&self, code: &str) -> StorageResult<Option<TicketType>>;
}

#[async_trait]
pub trait PricingCategoryRepository: Send + Sync {
    /// All date-specific categories whose range contains `date`
    async fn find_by_date(&self, date: NaiveDate) -> StorageResult<Vec<PricingCategory>>;

    async fn find_by_code(&self, code: &str) -> StorageResult<Option<PricingCategory>>;
}

#[async_trait]
pub trait TicketPriceRepository: Send + Sync {
    async fn find_by_ticket_type_and_pricing_category(
        &self,
        ticket_type: &TicketType,
        pricing_category: &PricingCategory,
    ) -> StorageResult<Option<TicketPrice>>;
}

#[async_trait]
pub trait DiscountCodeRepository: Send + Sync {
    async fn find_by_code(&self, code: &str) -> StorageResult<Option<DiscountCode>>;
}

#[async_trait]
pub trait AttendeeTicketStore: Send + Sync {
    /// Persist the ticket in one atomic write and return it with its storage id.
    /// A ticket code that already exists must be rejected.
    async fn save(&self, ticket: AttendeeTicket) -> StorageResult<AttendeeTicket>;
}
