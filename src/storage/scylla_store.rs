use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use scylla::client::session::Session;
use scylla::value::{CqlValue, Row};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::ScyllaConfig;
use crate::domain::registration::{
    AttendeeTicket, AttendeeTicketStore, DiscountCode, DiscountCodeRepository, PricingCategory,
    PricingCategoryRepository, StorageError, StorageResult, TicketPrice, TicketPriceRepository,
    TicketType, TicketTypeRepository,
};
use crate::messaging::{DeadLetter, DeadLetterStore};

// ============================================================================
// ScyllaDB Storage
// ============================================================================
//
// Reference data tables are read-only here. Tickets are written with a single
// lightweight-transaction INSERT keyed by ticket code: the write is atomic and
// a colliding ticket code is rejected instead of overwritten.
//
// Money is stored as decimal text so it round-trips exactly.
//
// ============================================================================

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS ticket_types (
        code text PRIMARY KEY,
        name text
    )",
    "CREATE TABLE IF NOT EXISTS pricing_categories (
        code text PRIMARY KEY,
        name text,
        valid_from date,
        valid_to date
    )",
    "CREATE TABLE IF NOT EXISTS ticket_prices (
        ticket_type text,
        pricing_category text,
        base_price text,
        PRIMARY KEY ((ticket_type, pricing_category))
    )",
    "CREATE TABLE IF NOT EXISTS discount_codes (
        code text PRIMARY KEY,
        amount text
    )",
    "CREATE TABLE IF NOT EXISTS attendee_tickets (
        ticket_code text PRIMARY KEY,
        id uuid,
        first_name text,
        last_name text,
        email text,
        phone_number text,
        title text,
        company text,
        ticket_type text,
        pricing_category text,
        base_price text,
        discount_code text,
        discount_amount text,
        net_price text,
        created_at timestamp
    )",
    "CREATE TABLE IF NOT EXISTS dead_letter_queue (
        id uuid PRIMARY KEY,
        ticket_code text,
        event_type text,
        routing_key text,
        payload text,
        error_message text,
        failure_count int,
        first_failed_at timestamp,
        last_failed_at timestamp,
        created_at timestamp
    )",
];

fn backend<E>(e: E) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::Backend(anyhow::Error::from(e))
}

fn decimal(column: &'static str, value: &str) -> StorageResult<Decimal> {
    Decimal::from_str(value).map_err(|_| StorageError::CorruptValue {
        column,
        value: value.to_string(),
    })
}

/// Create the keyspace and tables if they do not exist yet, then switch to the keyspace
pub async fn ensure_schema(session: &Session, config: &ScyllaConfig) -> anyhow::Result<()> {
    session
        .query_unpaged(
            format!(
                "CREATE KEYSPACE IF NOT EXISTS {} WITH REPLICATION = \
                 {{'class': 'SimpleStrategy', 'replication_factor': {}}}",
                config.keyspace, config.replication_factor
            ),
            &[],
        )
        .await?;

    session.use_keyspace(&config.keyspace, false).await?;

    for statement in SCHEMA {
        session.query_unpaged(*statement, &[]).await?;
    }

    tracing::info!(keyspace = %config.keyspace, tables = SCHEMA.len(), "Schema ready");
    Ok(())
}

pub struct ScyllaRepository {
    session: Arc<Session>,
}

impl ScyllaRepository {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TicketTypeRepository for ScyllaRepository {
    async fn find_by_code(&self, code: &str) -> StorageResult<Option<TicketType>> {
        let result = self
            .session
            .query_unpaged("SELECT code, name FROM ticket_types WHERE code = ?", (code,))
            .await
            .map_err(backend)?;

        let rows_result = result.into_rows_result().map_err(backend)?;
        let row = rows_result
            .maybe_first_row::<(String, Option<String>)>()
            .map_err(backend)?;

        Ok(row.map(|(code, name)| TicketType { code, name }))
    }
}

#[async_trait]
impl PricingCategoryRepository for ScyllaRepository {
    async fn find_by_date(&self, date: NaiveDate) -> StorageResult<Vec<PricingCategory>> {
        // Few rows; filtering client-side keeps overlapping ranges visible
        let result = self
            .session
            .query_unpaged(
                "SELECT code, name, valid_from, valid_to FROM pricing_categories",
                &[],
            )
            .await
            .map_err(backend)?;

        let rows_result = result.into_rows_result().map_err(backend)?;
        let mut categories = Vec::new();

        for row in rows_result
            .rows::<(String, Option<String>, Option<NaiveDate>, Option<NaiveDate>)>()
            .map_err(backend)?
        {
            let (code, name, valid_from, valid_to) = row.map_err(backend)?;
            let category = PricingCategory { code, name, valid_from, valid_to };
            if category.covers(date) {
                categories.push(category);
            }
        }

        tracing::debug!(date = %date, matches = categories.len(), "Pricing categories by date");
        Ok(categories)
    }

    async fn find_by_code(&self, code: &str) -> StorageResult<Option<PricingCategory>> {
        let result = self
            .session
            .query_unpaged(
                "SELECT code, name, valid_from, valid_to FROM pricing_categories WHERE code = ?",
                (code,),
            )
            .await
            .map_err(backend)?;

        let rows_result = result.into_rows_result().map_err(backend)?;
        let row = rows_result
            .maybe_first_row::<(String, Option<String>, Option<NaiveDate>, Option<NaiveDate>)>()
            .map_err(backend)?;

        Ok(row.map(|(code, name, valid_from, valid_to)| PricingCategory {
            code,
            name,
            valid_from,
            valid_to,
        }))
    }
}

#[async_trait]
impl TicketPriceRepository for ScyllaRepository {
    async fn find_by_ticket_type_and_pricing_category(
        &self,
        ticket_type: &TicketType,
        pricing_category: &PricingCategory,
    ) -> StorageResult<Option<TicketPrice>> {
        let result = self
            .session
            .query_unpaged(
                "SELECT base_price FROM ticket_prices WHERE ticket_type = ? AND pricing_category = ?",
                (ticket_type.code.as_str(), pricing_category.code.as_str()),
            )
            .await
            .map_err(backend)?;

        let rows_result = result.into_rows_result().map_err(backend)?;
        let Some((base_price,)) = rows_result.maybe_first_row::<(String,)>().map_err(backend)? else {
            return Ok(None);
        };

        Ok(Some(TicketPrice {
            ticket_type: ticket_type.clone(),
            pricing_category: pricing_category.clone(),
            base_price: decimal("base_price", &base_price)?,
        }))
    }
}

#[async_trait]
impl DiscountCodeRepository for ScyllaRepository {
    async fn find_by_code(&self, code: &str) -> StorageResult<Option<DiscountCode>> {
        let result = self
            .session
            .query_unpaged("SELECT code, amount FROM discount_codes WHERE code = ?", (code,))
            .await
            .map_err(backend)?;

        let rows_result = result.into_rows_result().map_err(backend)?;
        let Some((code, amount)) = rows_result
            .maybe_first_row::<(String, String)>()
            .map_err(backend)?
        else {
            return Ok(None);
        };

        let amount = decimal("amount", &amount)?;
        Ok(Some(DiscountCode { code, amount }))
    }
}

#[async_trait]
impl AttendeeTicketStore for ScyllaRepository {
    async fn save(&self, mut ticket: AttendeeTicket) -> StorageResult<AttendeeTicket> {
        let id = Uuid::now_v7();
        let attendee = &ticket.attendee;
        let price = &ticket.ticket_price;

        let result = self
            .session
            .query_unpaged(
                "INSERT INTO attendee_tickets (
                    ticket_code, id, first_name, last_name, email, phone_number, title, company,
                    ticket_type, pricing_category, base_price, discount_code, discount_amount,
                    net_price, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) IF NOT EXISTS",
                (
                    ticket.ticket_code.as_str(),
                    id,
                    attendee.first_name.as_str(),
                    attendee.last_name.as_str(),
                    attendee.email.as_str(),
                    attendee.phone_number.as_deref(),
                    attendee.title.as_deref(),
                    attendee.company.as_deref(),
                    price.ticket_type.code.as_str(),
                    price.pricing_category.code.as_str(),
                    price.base_price.to_string(),
                    ticket.discount_code.as_ref().map(|d| d.code.clone()),
                    ticket.discount_code.as_ref().map(|d| d.amount.to_string()),
                    ticket.net_price.to_string(),
                    Utc::now(),
                ),
            )
            .await
            .map_err(backend)?;

        // First column of a conditional write is `[applied]`
        let rows_result = result.into_rows_result().map_err(backend)?;
        let applied = rows_result
            .maybe_first_row::<Row>()
            .map_err(backend)?
            .and_then(|row| row.columns.into_iter().next().flatten())
            .and_then(|value| match value {
                CqlValue::Boolean(applied) => Some(applied),
                _ => None,
            })
            .unwrap_or(false);

        if !applied {
            return Err(StorageError::DuplicateTicketCode(ticket.ticket_code.to_string()));
        }

        tracing::debug!(ticket_code = %ticket.ticket_code, id = %id, "Attendee ticket inserted");
        ticket.id = Some(id);
        Ok(ticket)
    }
}

#[async_trait]
impl DeadLetterStore for ScyllaRepository {
    async fn add(&self, letter: DeadLetter) -> anyhow::Result<()> {
        let now: DateTime<Utc> = Utc::now();

        tracing::error!(
            dlq_id = %letter.id,
            ticket_code = %letter.ticket_code,
            event_type = %letter.event_type,
            error = %letter.error_message,
            failure_count = letter.failure_count,
            "💀 Adding message to Dead Letter Queue"
        );

        self.session
            .query_unpaged(
                "INSERT INTO dead_letter_queue (
                    id, ticket_code, event_type, routing_key, payload,
                    error_message, failure_count, first_failed_at,
                    last_failed_at, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    letter.id,
                    &letter.ticket_code,
                    &letter.event_type,
                    &letter.routing_key,
                    &letter.payload,
                    &letter.error_message,
                    letter.failure_count,
                    letter.first_failed_at,
                    now,
                    now,
                ),
            )
            .await
            .map_err(|e| anyhow::anyhow!("Failed to insert into DLQ: {}", e))?;

        tracing::info!(dlq_id = %letter.id, "Message successfully stored in DLQ");
        Ok(())
    }
}
