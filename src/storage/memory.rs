use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::registration::{
    AttendeeTicket, AttendeeTicketStore, DiscountCode, DiscountCodeRepository, PricingCategory,
    PricingCategoryRepository, StorageError, StorageResult, TicketPrice, TicketPriceRepository,
    TicketType, TicketTypeRepository,
};
use crate::messaging::{DeadLetter, DeadLetterStore, EventSink};

// ============================================================================
// In-Memory Storage (tests)
// ============================================================================

#[derive(Default)]
pub struct InMemoryReferenceData {
    ticket_types: Vec<TicketType>,
    categories: Vec<PricingCategory>,
    prices: Vec<TicketPrice>,
    discounts: Vec<DiscountCode>,
}

impl InMemoryReferenceData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ticket_type(mut self, code: &str) -> Self {
        self.ticket_types.push(TicketType { code: code.into(), name: None });
        self
    }

    pub fn with_category(mut self, code: &str, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.categories.push(PricingCategory {
            code: code.into(),
            name: None,
            valid_from: from,
            valid_to: to,
        });
        self
    }

    pub fn with_fallback_category(self) -> Self {
        self.with_category("L", None, None)
    }

    pub fn with_price(mut self, ticket_type: &str, category: &str, base_price: Decimal) -> Self {
        let ticket_type = self
            .ticket_types
            .iter()
            .find(|t| t.code == ticket_type)
            .cloned()
            .unwrap_or(TicketType { code: ticket_type.into(), name: None });
        let pricing_category = self
            .categories
            .iter()
            .find(|c| c.code == category)
            .cloned()
            .unwrap_or(PricingCategory {
                code: category.into(),
                name: None,
                valid_from: None,
                valid_to: None,
            });
        self.prices.push(TicketPrice { ticket_type, pricing_category, base_price });
        self
    }

    pub fn with_discount(mut self, code: &str, amount: Decimal) -> Self {
        self.discounts.push(DiscountCode { code: code.into(), amount });
        self
    }
}

#[async_trait]
impl TicketTypeRepository for InMemoryReferenceData {
    async fn find_by_code(&self, code: &str) -> StorageResult<Option<TicketType>> {
        Ok(self.ticket_types.iter().find(|t| t.code == code).cloned())
    }
}

#[async_trait]
impl PricingCategoryRepository for InMemoryReferenceData {
    async fn find_by_date(&self, date: NaiveDate) -> StorageResult<Vec<PricingCategory>> {
        Ok(self.categories.iter().filter(|c| c.covers(date)).cloned().collect())
    }

    async fn find_by_code(&self, code: &str) -> StorageResult<Option<PricingCategory>> {
        Ok(self.categories.iter().find(|c| c.code == code).cloned())
    }
}

#[async_trait]
impl TicketPriceRepository for InMemoryReferenceData {
    async fn find_by_ticket_type_and_pricing_category(
        &self,
        ticket_type: &TicketType,
        pricing_category: &PricingCategory,
    ) -> StorageResult<Option<TicketPrice>> {
        Ok(self
            .prices
            .iter()
            .find(|p| {
                p.ticket_type.code == ticket_type.code
                    && p.pricing_category.code == pricing_category.code
            })
            .cloned())
    }
}

#[async_trait]
impl DiscountCodeRepository for InMemoryReferenceData {
    async fn find_by_code(&self, code: &str) -> StorageResult<Option<DiscountCode>> {
        Ok(self.discounts.iter().find(|d| d.code == code).cloned())
    }
}

/// Ticket store with an on/off switch for simulated outages
#[derive(Default)]
pub struct InMemoryTicketStore {
    tickets: Mutex<HashMap<String, AttendeeTicket>>,
    failing: AtomicBool,
    save_calls: AtomicUsize,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.tickets.lock().unwrap().len()
    }

    pub fn get(&self, ticket_code: &str) -> Option<AttendeeTicket> {
        self.tickets.lock().unwrap().get(ticket_code).cloned()
    }
}

#[async_trait]
impl AttendeeTicketStore for InMemoryTicketStore {
    async fn save(&self, mut ticket: AttendeeTicket) -> StorageResult<AttendeeTicket> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(anyhow::anyhow!("simulated storage fault")));
        }

        let mut tickets = self.tickets.lock().unwrap();
        let code = ticket.ticket_code.as_str().to_string();
        if tickets.contains_key(&code) {
            return Err(StorageError::DuplicateTicketCode(code));
        }
        ticket.id = Some(Uuid::now_v7());
        tickets.insert(code, ticket.clone());
        Ok(ticket)
    }
}

/// Dead letter store; `failing()` rejects every write
#[derive(Default)]
pub struct InMemoryDeadLetterStore {
    letters: Mutex<Vec<DeadLetter>>,
    failing: AtomicBool,
}

impl InMemoryDeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let store = Self::default();
        store.failing.store(true, Ordering::SeqCst);
        store
    }

    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn add(&self, letter: DeadLetter) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("simulated DLQ outage");
        }
        self.letters.lock().unwrap().push(letter);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub routing_key: String,
    pub message_key: String,
    pub payload: String,
}

/// Broker stand-in that records what it receives and can fail the first N sends
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<PublishedMessage>>,
    failures_left: AtomicUsize,
    attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_times(failures: usize) -> Self {
        let sink = Self::default();
        sink.failures_left.store(failures, Ordering::SeqCst);
        sink
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn publish(&self, routing_key: &str, message_key: &str, payload: &str) -> anyhow::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("simulated broker outage");
        }

        self.published.lock().unwrap().push(PublishedMessage {
            routing_key: routing_key.to_string(),
            message_key: message_key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}
