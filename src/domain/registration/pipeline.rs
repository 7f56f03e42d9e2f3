use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use std::time::Instant;

use crate::messaging::PublicationQueue;
use crate::metrics::Metrics;
use crate::models::AttendeeRegistration;

use super::errors::{ErrorKind, RegistrationError};
use super::events::TicketRegistered;
use super::pricing::PricingResolver;
use super::repositories::{AttendeeTicketStore, DiscountCodeRepository};
use super::unit_of_work::UnitOfWork;
use super::value_objects::{
    net_price, trim_to_none, Attendee, AttendeeTicket, DiscountCode, RegistrationStage, TicketCode,
};

// ============================================================================
// Registration Pipeline
// ============================================================================
//
// Orchestrates: Registration → Attendee → Price → Discount → Ticket → Store
//               → (after commit) Publication Queue
//
// ============================================================================

pub struct RegistrationPipeline {
    pricing: PricingResolver,
    discount_codes: Arc<dyn DiscountCodeRepository>,
    tickets: Arc<dyn AttendeeTicketStore>,
    publications: PublicationQueue,
    metrics: Arc<Metrics>,
}

impl RegistrationPipeline {
    pub fn new(
        pricing: PricingResolver,
        discount_codes: Arc<dyn DiscountCodeRepository>,
        tickets: Arc<dyn AttendeeTicketStore>,
        publications: PublicationQueue,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            pricing,
            discount_codes,
            tickets,
            publications,
            metrics,
        }
    }

    /// Register an attendee as one unit of work.
    ///
    /// Either the ticket is persisted and its event enqueued for publication,
    /// or nothing is persisted and nothing is enqueued.
    pub async fn register(
        &self,
        received_at: DateTime<FixedOffset>,
        registration: &AttendeeRegistration,
    ) -> Result<AttendeeTicket, RegistrationError> {
        let started = Instant::now();

        tracing::info!(
            received_at = %received_at,
            email = %registration.email,
            ticket_type = %registration.ticket_type,
            stage = ?RegistrationStage::Received,
            "Registration received"
        );

        let result = self.register_in_unit_of_work(received_at, registration).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(ticket) => {
                self.metrics.record_registration("registered", elapsed);
                self.enqueue(received_at, &ticket);
                Ok(ticket)
            }
            Err(e) => {
                self.metrics.record_registration(e.label(), elapsed);
                match e.kind() {
                    ErrorKind::InvalidInput => tracing::warn!(
                        error = %e,
                        email = %registration.email,
                        stage = ?RegistrationStage::Failed,
                        "Registration rejected"
                    ),
                    ErrorKind::ReferenceData => tracing::error!(
                        alert = true,
                        error = %e,
                        email = %registration.email,
                        stage = ?RegistrationStage::Failed,
                        "Registration failed: reference data misconfigured"
                    ),
                    ErrorKind::Persistence => tracing::error!(
                        error = %e,
                        email = %registration.email,
                        stage = ?RegistrationStage::Failed,
                        "Registration failed: storage fault"
                    ),
                }
                Err(e)
            }
        }
    }

    async fn register_in_unit_of_work(
        &self,
        received_at: DateTime<FixedOffset>,
        registration: &AttendeeRegistration,
    ) -> Result<AttendeeTicket, RegistrationError> {
        let mut uow = UnitOfWork::begin(self.tickets.as_ref());

        let attendee = Attendee::from_registration(registration)?;
        tracing::debug!(email = %attendee.email, stage = ?RegistrationStage::Validated, "Attendee built");

        let ticket_price = self.pricing.resolve(received_at, &registration.ticket_type).await?;
        tracing::debug!(
            ticket_type = %ticket_price.ticket_type.code,
            pricing_category = %ticket_price.pricing_category.code,
            base_price = %ticket_price.base_price,
            stage = ?RegistrationStage::Priced,
            "Ticket price resolved"
        );

        let discount_code = self.discount_for(registration.discount_code.as_deref()).await?;
        let ticket_code = TicketCode::generate();

        let (net_price, clamped) = net_price(ticket_price.base_price, discount_code.as_ref());
        if clamped {
            tracing::warn!(
                ticket_code = %ticket_code,
                base_price = %ticket_price.base_price,
                discount = ?discount_code.as_ref().map(|d| d.amount),
                "Discount exceeds base price, net price clamped to zero"
            );
        }
        tracing::debug!(
            ticket_code = %ticket_code,
            net_price = %net_price,
            stage = ?RegistrationStage::Discounted,
            "Net price computed"
        );

        uow.stage(AttendeeTicket {
            id: None,
            ticket_code,
            attendee,
            ticket_price,
            discount_code,
            net_price,
        });

        let ticket = uow.commit().await?;
        tracing::info!(
            ticket_code = %ticket.ticket_code,
            net_price = %ticket.net_price,
            stage = ?RegistrationStage::Persisted,
            "Registration saved"
        );

        Ok(ticket)
    }

    async fn discount_for(&self, code: Option<&str>) -> Result<Option<DiscountCode>, RegistrationError> {
        let Some(code) = trim_to_none(code) else {
            return Ok(None);
        };

        let discount = self
            .discount_codes
            .find_by_code(&code)
            .await
            .map_err(RegistrationError::Repository)?;

        if discount.is_none() {
            tracing::info!(discount_code = %code, "Unknown discount code, no discount applied");
        }

        Ok(discount)
    }

    /// Hand the committed ticket to the publisher. Failures here never undo
    /// or mask the registration.
    fn enqueue(&self, received_at: DateTime<FixedOffset>, ticket: &AttendeeTicket) {
        let event = TicketRegistered::new(received_at, ticket.clone());

        match self.publications.enqueue(event) {
            Ok(()) => tracing::debug!(
                ticket_code = %ticket.ticket_code,
                "Registration event enqueued for publication"
            ),
            Err(e) => {
                self.metrics.record_publication("enqueue_failed", 0.0);
                tracing::error!(
                    alert = true,
                    error = %e,
                    ticket_code = %ticket.ticket_code,
                    "Registration persisted but its event could not be enqueued"
                );
            }
        }
    }
}
