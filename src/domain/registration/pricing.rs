use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

use super::errors::RegistrationError;
use super::repositories::{PricingCategoryRepository, TicketPriceRepository, TicketTypeRepository};
use super::value_objects::{PricingCategory, TicketPrice, FALLBACK_PRICING_CATEGORY};

// ============================================================================
// Pricing Resolver
// ============================================================================
//
// ticket type → pricing category for the receipt date (or fallback "L")
//             → base price of the pair
//
// ============================================================================

pub struct PricingResolver {
    ticket_types: Arc<dyn TicketTypeRepository>,
    pricing_categories: Arc<dyn PricingCategoryRepository>,
    ticket_prices: Arc<dyn TicketPriceRepository>,
}

impl PricingResolver {
    pub fn new(
        ticket_types: Arc<dyn TicketTypeRepository>,
        pricing_categories: Arc<dyn PricingCategoryRepository>,
        ticket_prices: Arc<dyn TicketPriceRepository>,
    ) -> Self {
        Self {
            ticket_types,
            pricing_categories,
            ticket_prices,
        }
    }

    /// Resolve the price applicable to `ticket_type_code` at `received_at`
    pub async fn resolve(
        &self,
        received_at: DateTime<FixedOffset>,
        ticket_type_code: &str,
    ) -> Result<TicketPrice, RegistrationError> {
        let ticket_type = self
            .ticket_types
            .find_by_code(ticket_type_code)
            .await
            .map_err(RegistrationError::Repository)?
            .ok_or_else(|| RegistrationError::InvalidTicketType(ticket_type_code.to_string()))?;

        let pricing_category = self.pricing_category_for(received_at).await?;

        self.ticket_prices
            .find_by_ticket_type_and_pricing_category(&ticket_type, &pricing_category)
            .await
            .map_err(RegistrationError::Repository)?
            .ok_or_else(|| RegistrationError::MissingTicketPrice {
                ticket_type: ticket_type.code.clone(),
                pricing_category: pricing_category.code.clone(),
            })
    }

    async fn pricing_category_for(
        &self,
        received_at: DateTime<FixedOffset>,
    ) -> Result<PricingCategory, RegistrationError> {
        // Calendar date in the sender's own offset, not the server zone
        let date = received_at.date_naive();

        let mut matches = self
            .pricing_categories
            .find_by_date(date)
            .await
            .map_err(RegistrationError::Repository)?;

        match matches.len() {
            0 => {
                tracing::debug!(
                    date = %date,
                    fallback = FALLBACK_PRICING_CATEGORY,
                    "No dated pricing category matches, using fallback"
                );
                self.pricing_categories
                    .find_by_code(FALLBACK_PRICING_CATEGORY)
                    .await
                    .map_err(RegistrationError::Repository)?
                    .ok_or(RegistrationError::MissingPricingCategory(date))
            }
            1 => Ok(matches.remove(0)),
            _ => {
                let mut codes: Vec<String> = matches.into_iter().map(|c| c.code).collect();
                codes.sort();
                Err(RegistrationError::AmbiguousPricingCategory { date, codes })
            }
        }
    }
}
