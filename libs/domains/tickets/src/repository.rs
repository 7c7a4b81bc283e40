use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{TicketError, TicketResult};
use crate::models::{ServiceClass, Ticket, TicketStatus};
use crate::queue;

/// Repository trait for Ticket persistence
///
/// This trait defines the data access interface for tickets.
/// Implementations can use different storage backends (MongoDB, in-memory).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Persist a new ticket
    async fn insert(&self, ticket: Ticket) -> TicketResult<Ticket>;

    /// Get a ticket by ID
    async fn find_by_id(&self, id: Uuid) -> TicketResult<Option<Ticket>>;

    /// All tickets for an owner, ordered by issuance time ascending
    async fn list_by_owner(&self, owner_id: Uuid) -> TicketResult<Vec<Ticket>>;

    /// An owner's waiting set, in serve order
    async fn list_waiting(&self, owner_id: Uuid) -> TicketResult<Vec<Ticket>>;

    /// Persist a fully updated ticket record
    async fn replace(&self, ticket: &Ticket) -> TicketResult<()>;

    /// Delete a ticket by ID; returns whether a record existed
    async fn delete(&self, id: Uuid) -> TicketResult<bool>;

    /// Delete every ticket belonging to an owner; returns the removed count
    async fn delete_by_owner(&self, owner_id: Uuid) -> TicketResult<u64>;

    /// Count an owner's tickets of a class issued at or after `since`
    async fn count_issued_since(
        &self,
        owner_id: Uuid,
        class: ServiceClass,
        since: DateTime<Utc>,
    ) -> TicketResult<u64>;

    /// Atomically claim the best waiting ticket: transition it to `serving`
    /// (stamping `served_at = now`) and return it, or `None` when nothing is
    /// waiting.
    ///
    /// Selection and transition happen as one conditional update so that two
    /// concurrent callers can never claim the same ticket.
    async fn claim_next_waiting(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> TicketResult<Option<Ticket>>;
}

/// In-memory implementation of TicketRepository (for development/testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryTicketRepository {
    tickets: Arc<RwLock<HashMap<Uuid, Ticket>>>,
}

impl InMemoryTicketRepository {
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn insert(&self, ticket: Ticket) -> TicketResult<Ticket> {
        let mut tickets = self.tickets.write().await;
        tickets.insert(ticket.id, ticket.clone());

        tracing::info!(ticket_id = %ticket.id, "Ticket inserted");
        Ok(ticket)
    }

    async fn find_by_id(&self, id: Uuid) -> TicketResult<Option<Ticket>> {
        let tickets = self.tickets.read().await;
        Ok(tickets.get(&id).cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> TicketResult<Vec<Ticket>> {
        let tickets = self.tickets.read().await;

        let mut result: Vec<Ticket> = tickets
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();

        result.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then_with(|| a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn list_waiting(&self, owner_id: Uuid) -> TicketResult<Vec<Ticket>> {
        let tickets = self.tickets.read().await;

        let mut result: Vec<Ticket> = tickets
            .values()
            .filter(|t| t.owner_id == owner_id && t.status == TicketStatus::Waiting)
            .cloned()
            .collect();

        queue::sort_into_serve_order(&mut result);
        Ok(result)
    }

    async fn replace(&self, ticket: &Ticket) -> TicketResult<()> {
        let mut tickets = self.tickets.write().await;

        if !tickets.contains_key(&ticket.id) {
            return Err(TicketError::NotFound(ticket.id));
        }

        tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> TicketResult<bool> {
        let mut tickets = self.tickets.write().await;

        if tickets.remove(&id).is_some() {
            tracing::info!(ticket_id = %id, "Ticket deleted");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> TicketResult<u64> {
        let mut tickets = self.tickets.write().await;

        let before = tickets.len();
        tickets.retain(|_, t| t.owner_id != owner_id);
        let removed = (before - tickets.len()) as u64;

        tracing::info!(%owner_id, removed, "Queue reset");
        Ok(removed)
    }

    async fn count_issued_since(
        &self,
        owner_id: Uuid,
        class: ServiceClass,
        since: DateTime<Utc>,
    ) -> TicketResult<u64> {
        let tickets = self.tickets.read().await;

        let count = tickets
            .values()
            .filter(|t| t.owner_id == owner_id && t.service_class == class && t.issued_at >= since)
            .count() as u64;

        Ok(count)
    }

    async fn claim_next_waiting(
        &self,
        owner_id: Uuid,
        now: DateTime<Utc>,
    ) -> TicketResult<Option<Ticket>> {
        // Single write lock: selection and transition are one atomic step
        let mut tickets = self.tickets.write().await;

        let next_id = tickets
            .values()
            .filter(|t| t.owner_id == owner_id && t.status == TicketStatus::Waiting)
            .min_by(|a, b| queue::serve_order(a, b))
            .map(|t| t.id);

        let Some(id) = next_id else {
            return Ok(None);
        };

        let ticket = tickets
            .get_mut(&id)
            .ok_or(TicketError::NotFound(id))?;
        ticket.transition_to(TicketStatus::Serving, now);

        tracing::info!(ticket_id = %id, "Ticket called to counter");
        Ok(Some(ticket.clone()))
    }
}
