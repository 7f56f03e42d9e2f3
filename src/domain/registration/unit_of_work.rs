use super::errors::{RegistrationError, StorageError};
use super::repositories::AttendeeTicketStore;
use super::value_objects::AttendeeTicket;

// ============================================================================
// Unit of Work
// ============================================================================
//
// Scopes one registration. Nothing reaches the store until `commit`, and
// `commit` hands the staged ticket to the store as a single atomic write.
// Dropping the unit of work without committing discards everything staged.
//
// ============================================================================

pub struct UnitOfWork<'a> {
    store: &'a dyn AttendeeTicketStore,
    staged: Option<AttendeeTicket>,
}

impl<'a> UnitOfWork<'a> {
    pub fn begin(store: &'a dyn AttendeeTicketStore) -> Self {
        Self { store, staged: None }
    }

    pub fn stage(&mut self, ticket: AttendeeTicket) {
        self.staged = Some(ticket);
    }

    pub async fn commit(mut self) -> Result<AttendeeTicket, RegistrationError> {
        let ticket = self.staged.take().ok_or_else(|| {
            RegistrationError::Persistence(StorageError::Backend(anyhow::anyhow!(
                "unit of work committed with nothing staged"
            )))
        })?;
        let ticket_code = ticket.ticket_code.clone();

        match self.store.save(ticket).await {
            Ok(saved) => {
                tracing::debug!(ticket_code = %ticket_code, "Unit of work committed");
                Ok(saved)
            }
            Err(e) => {
                tracing::warn!(
                    ticket_code = %ticket_code,
                    error = %e,
                    "Unit of work rolled back"
                );
                Err(RegistrationError::Persistence(e))
            }
        }
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.staged.take() {
            tracing::debug!(
                ticket_code = %ticket.ticket_code,
                "Unit of work dropped before commit, staged ticket discarded"
            );
        }
    }
}
