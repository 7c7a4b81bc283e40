//! Ticket Service - ownership checks, lifecycle guards, and orchestration

use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{TicketError, TicketResult};
use crate::models::{Counters, IssueTicket, ResetOutcome, ServiceClass, Ticket, UpdateTicket};
use crate::queue::{
    self, PRIORITY_COUNTER_BASE, QueueConfig, QueueStats, REGULAR_COUNTER_BASE,
};
use crate::repository::TicketRepository;

/// Ticket service providing the queue operations.
///
/// Every operation takes the verified owner id and only ever touches that
/// owner's tickets; cross-owner access fails with
/// [`TicketError::NotOwner`].
pub struct TicketService<R: TicketRepository> {
    repository: Arc<R>,
    config: QueueConfig,
}

impl<R: TicketRepository> TicketService<R> {
    pub fn new(repository: R, config: QueueConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            config,
        }
    }

    /// All of the owner's tickets, ordered by issuance time
    #[instrument(skip(self))]
    pub async fn list_tickets(&self, owner_id: Uuid) -> TicketResult<Vec<Ticket>> {
        self.repository.list_by_owner(owner_id).await
    }

    /// Issue a new waiting ticket.
    ///
    /// The dashboard may supply `number` and `estimated_wait_minutes` from
    /// its own counters; when omitted they are derived here - the number
    /// from the day counter, the estimate from the current waiting set.
    #[instrument(skip(self, input), fields(service_class = %input.service_class))]
    pub async fn issue_ticket(&self, owner_id: Uuid, input: IssueTicket) -> TicketResult<Ticket> {
        input
            .validate()
            .map_err(|e| TicketError::Validation(e.to_string()))?;

        let class = input.service_class;

        let estimated_wait_minutes = match input.estimated_wait_minutes {
            Some(minutes) => minutes,
            None => {
                let waiting = self.repository.list_waiting(owner_id).await?;
                queue::estimate_wait(&self.config, &waiting, class)
            }
        };

        let number = match input.number {
            Some(number) => number,
            None => queue::display_number(class, self.next_counter(owner_id, class).await?),
        };

        let priority_weight = input
            .priority_weight
            .unwrap_or_else(|| class.priority_weight());

        let ticket = Ticket::issue(owner_id, number, class, priority_weight, estimated_wait_minutes);
        self.repository.insert(ticket).await
    }

    /// Get one ticket, verifying ownership
    #[instrument(skip(self))]
    pub async fn get_ticket(&self, owner_id: Uuid, id: Uuid) -> TicketResult<Ticket> {
        let ticket = self
            .repository
            .find_by_id(id)
            .await?
            .ok_or(TicketError::NotFound(id))?;

        if ticket.owner_id != owner_id {
            return Err(TicketError::NotOwner(id));
        }

        Ok(ticket)
    }

    /// Apply a partial lifecycle update to a ticket.
    ///
    /// Status changes must follow the lifecycle
    /// `waiting → serving → {completed | no-show}`; anything else is
    /// rejected. An accepted transition stamps its timestamp with the
    /// current time, and explicitly supplied timestamps win over the stamp.
    #[instrument(skip(self, input))]
    pub async fn update_ticket(
        &self,
        owner_id: Uuid,
        id: Uuid,
        input: UpdateTicket,
    ) -> TicketResult<Ticket> {
        input
            .validate()
            .map_err(|e| TicketError::Validation(e.to_string()))?;

        let mut ticket = self.get_ticket(owner_id, id).await?;

        if let Some(next) = input.status {
            if next != ticket.status {
                if !ticket.status.can_transition_to(next) {
                    return Err(TicketError::Validation(format!(
                        "Illegal status transition: {} -> {}",
                        ticket.status, next
                    )));
                }
                ticket.transition_to(next, Utc::now());
            }
        }

        if let Some(at) = input.served_at {
            ticket.served_at = Some(at);
        }
        if let Some(at) = input.completed_at {
            ticket.completed_at = Some(at);
        }
        if let Some(at) = input.no_show_at {
            ticket.no_show_at = Some(at);
        }

        self.repository.replace(&ticket).await?;
        Ok(ticket)
    }

    /// Delete one ticket, verifying ownership
    #[instrument(skip(self))]
    pub async fn delete_ticket(&self, owner_id: Uuid, id: Uuid) -> TicketResult<()> {
        self.get_ticket(owner_id, id).await?;

        if !self.repository.delete(id).await? {
            return Err(TicketError::NotFound(id));
        }
        Ok(())
    }

    /// Display counters: per-class issue counts since local midnight plus
    /// the base offsets (regular 1001, priority 1).
    ///
    /// A display convenience derived from counts, not a uniqueness
    /// guarantee; the store-assigned id is the only true identity.
    #[instrument(skip(self))]
    pub async fn counters(&self, owner_id: Uuid) -> TicketResult<Counters> {
        Ok(Counters {
            regular: self.next_counter(owner_id, ServiceClass::Regular).await?,
            priority: self.next_counter(owner_id, ServiceClass::Priority).await?,
        })
    }

    /// Call the next ticket: atomically claim the best waiting ticket and
    /// move it to `serving`.
    #[instrument(skip(self))]
    pub async fn call_next(&self, owner_id: Uuid) -> TicketResult<Ticket> {
        self.repository
            .claim_next_waiting(owner_id, Utc::now())
            .await?
            .ok_or(TicketError::QueueEmpty)
    }

    /// Remove every ticket belonging to the owner
    #[instrument(skip(self))]
    pub async fn reset_queue(&self, owner_id: Uuid) -> TicketResult<ResetOutcome> {
        let deleted = self.repository.delete_by_owner(owner_id).await?;
        Ok(ResetOutcome { deleted })
    }

    /// Derived dashboard statistics over the owner's queue
    #[instrument(skip(self))]
    pub async fn queue_stats(&self, owner_id: Uuid) -> TicketResult<QueueStats> {
        let tickets = self.repository.list_by_owner(owner_id).await?;
        Ok(QueueStats::derive(&tickets))
    }

    async fn next_counter(&self, owner_id: Uuid, class: ServiceClass) -> TicketResult<i64> {
        let since = queue::start_of_local_day(Utc::now());
        let issued = self
            .repository
            .count_issued_since(owner_id, class, since)
            .await?;

        let base = match class {
            ServiceClass::Regular => REGULAR_COUNTER_BASE,
            ServiceClass::Priority => PRIORITY_COUNTER_BASE,
        };

        Ok(issued as i64 + base)
    }
}

impl<R: TicketRepository> Clone for TicketService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketStatus;
    use crate::repository::{InMemoryTicketRepository, MockTicketRepository};
    use chrono::{Duration, Utc};
    use mockall::predicate::eq;

    fn service_with(mock: MockTicketRepository) -> TicketService<MockTicketRepository> {
        TicketService::new(mock, QueueConfig::default())
    }

    fn waiting_ticket(owner: Uuid, class: ServiceClass) -> Ticket {
        Ticket::issue(owner, "t".to_string(), class, class.priority_weight(), 0)
    }

    #[tokio::test]
    async fn test_issue_derives_estimate_from_waiting_set() {
        let owner = Uuid::new_v4();
        let mut mock = MockTicketRepository::new();

        // Two priority and one regular waiting: regular estimate = 2*5 + 1*8
        let waiting = vec![
            waiting_ticket(owner, ServiceClass::Priority),
            waiting_ticket(owner, ServiceClass::Priority),
            waiting_ticket(owner, ServiceClass::Regular),
        ];
        mock.expect_list_waiting()
            .with(eq(owner))
            .returning(move |_| Ok(waiting.clone()));
        mock.expect_insert().returning(|ticket| Ok(ticket));

        let service = service_with(mock);
        let ticket = service
            .issue_ticket(
                owner,
                IssueTicket {
                    number: Some("1001".to_string()),
                    service_class: ServiceClass::Regular,
                    estimated_wait_minutes: None,
                    priority_weight: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(ticket.estimated_wait_minutes, 18);
        assert_eq!(ticket.priority_weight, 0);
        assert_eq!(ticket.status, TicketStatus::Waiting);
    }

    #[tokio::test]
    async fn test_issue_derives_display_number_from_day_counter() {
        let owner = Uuid::new_v4();
        let mut mock = MockTicketRepository::new();

        // Three regular tickets issued today -> next number is 1004
        mock.expect_count_issued_since()
            .returning(|_, _, _| Ok(3));
        mock.expect_insert().returning(|ticket| Ok(ticket));

        let service = service_with(mock);
        let ticket = service
            .issue_ticket(
                owner,
                IssueTicket {
                    number: None,
                    service_class: ServiceClass::Regular,
                    estimated_wait_minutes: Some(0),
                    priority_weight: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(ticket.number, "1004");
    }

    #[tokio::test]
    async fn test_issue_formats_priority_numbers() {
        let owner = Uuid::new_v4();
        let mut mock = MockTicketRepository::new();

        mock.expect_count_issued_since()
            .returning(|_, _, _| Ok(0));
        mock.expect_insert().returning(|ticket| Ok(ticket));

        let service = service_with(mock);
        let ticket = service
            .issue_ticket(
                owner,
                IssueTicket {
                    number: None,
                    service_class: ServiceClass::Priority,
                    estimated_wait_minutes: Some(5),
                    priority_weight: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(ticket.number, "P01");
        assert_eq!(ticket.priority_weight, 1);
    }

    #[tokio::test]
    async fn test_issue_twice_yields_distinct_tickets() {
        let owner = Uuid::new_v4();
        let repo = InMemoryTicketRepository::new();
        let service = TicketService::new(repo, QueueConfig::default());

        let input = IssueTicket {
            number: Some("1001".to_string()),
            service_class: ServiceClass::Regular,
            estimated_wait_minutes: Some(8),
            priority_weight: None,
        };

        let first = service.issue_ticket(owner, input.clone()).await.unwrap();
        let second = service.issue_ticket(owner, input).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(service.list_tickets(owner).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_by_non_owner_is_forbidden() {
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let ticket = waiting_ticket(owner, ServiceClass::Regular);
        let id = ticket.id;

        let mut mock = MockTicketRepository::new();
        mock.expect_find_by_id()
            .with(eq(id))
            .returning(move |_| Ok(Some(ticket.clone())));
        // No expect_replace: any write would panic the test

        let service = service_with(mock);
        let result = service
            .update_ticket(
                intruder,
                id,
                UpdateTicket {
                    status: Some(TicketStatus::Serving),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(TicketError::NotOwner(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_illegal_transition() {
        let owner = Uuid::new_v4();
        let ticket = waiting_ticket(owner, ServiceClass::Regular);
        let id = ticket.id;

        let mut mock = MockTicketRepository::new();
        mock.expect_find_by_id()
            .returning(move |_| Ok(Some(ticket.clone())));

        let service = service_with(mock);

        // waiting -> completed skips the serving step
        let result = service
            .update_ticket(
                owner,
                id,
                UpdateTicket {
                    status: Some(TicketStatus::Completed),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(TicketError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_transition_stamps_timestamp() {
        let owner = Uuid::new_v4();
        let ticket = waiting_ticket(owner, ServiceClass::Regular);
        let id = ticket.id;

        let mut mock = MockTicketRepository::new();
        mock.expect_find_by_id()
            .returning(move |_| Ok(Some(ticket.clone())));
        mock.expect_replace()
            .withf(|t| t.status == TicketStatus::Serving && t.served_at.is_some())
            .returning(|_| Ok(()));

        let service = service_with(mock);
        let updated = service
            .update_ticket(
                owner,
                id,
                UpdateTicket {
                    status: Some(TicketStatus::Serving),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, TicketStatus::Serving);
        assert!(updated.served_at.is_some());
    }

    #[tokio::test]
    async fn test_update_supplied_timestamp_wins() {
        let owner = Uuid::new_v4();
        let ticket = waiting_ticket(owner, ServiceClass::Regular);
        let id = ticket.id;
        let called_at = Utc::now() - Duration::minutes(3);

        let mut mock = MockTicketRepository::new();
        mock.expect_find_by_id()
            .returning(move |_| Ok(Some(ticket.clone())));
        mock.expect_replace().returning(|_| Ok(()));

        let service = service_with(mock);
        let updated = service
            .update_ticket(
                owner,
                id,
                UpdateTicket {
                    status: Some(TicketStatus::Serving),
                    served_at: Some(called_at),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.served_at, Some(called_at));
    }

    #[tokio::test]
    async fn test_update_unknown_ticket_is_not_found() {
        let mut mock = MockTicketRepository::new();
        mock.expect_find_by_id().returning(|_| Ok(None));

        let service = service_with(mock);
        let result = service
            .update_ticket(Uuid::new_v4(), Uuid::new_v4(), UpdateTicket::default())
            .await;

        assert!(matches!(result, Err(TicketError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_by_non_owner_is_forbidden() {
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let ticket = waiting_ticket(owner, ServiceClass::Regular);
        let id = ticket.id;

        let mut mock = MockTicketRepository::new();
        mock.expect_find_by_id()
            .returning(move |_| Ok(Some(ticket.clone())));

        let service = service_with(mock);
        let result = service.delete_ticket(intruder, id).await;

        assert!(matches!(result, Err(TicketError::NotOwner(_))));
    }

    #[tokio::test]
    async fn test_counters_apply_base_offsets() {
        let owner = Uuid::new_v4();
        let mut mock = MockTicketRepository::new();

        mock.expect_count_issued_since()
            .withf(move |o, class, _| *o == owner && *class == ServiceClass::Regular)
            .returning(|_, _, _| Ok(3));
        mock.expect_count_issued_since()
            .withf(move |o, class, _| *o == owner && *class == ServiceClass::Priority)
            .returning(|_, _, _| Ok(0));

        let service = service_with(mock);
        let counters = service.counters(owner).await.unwrap();

        assert_eq!(counters.regular, 1004);
        assert_eq!(counters.priority, 1);
    }

    #[tokio::test]
    async fn test_call_next_on_empty_queue() {
        let mut mock = MockTicketRepository::new();
        mock.expect_claim_next_waiting().returning(|_, _| Ok(None));

        let service = service_with(mock);
        let result = service.call_next(Uuid::new_v4()).await;

        assert!(matches!(result, Err(TicketError::QueueEmpty)));
    }

    #[tokio::test]
    async fn test_call_next_returns_claimed_ticket() {
        let owner = Uuid::new_v4();
        let mut claimed = waiting_ticket(owner, ServiceClass::Priority);
        claimed.transition_to(TicketStatus::Serving, Utc::now());
        let claimed_id = claimed.id;

        let mut mock = MockTicketRepository::new();
        mock.expect_claim_next_waiting()
            .with(eq(owner), mockall::predicate::always())
            .returning(move |_, _| Ok(Some(claimed.clone())));

        let service = service_with(mock);
        let ticket = service.call_next(owner).await.unwrap();

        assert_eq!(ticket.id, claimed_id);
        assert_eq!(ticket.status, TicketStatus::Serving);
    }

    #[tokio::test]
    async fn test_reset_reports_removed_count() {
        let mut mock = MockTicketRepository::new();
        mock.expect_delete_by_owner().returning(|_| Ok(5));

        let service = service_with(mock);
        let outcome = service.reset_queue(Uuid::new_v4()).await.unwrap();

        assert_eq!(outcome.deleted, 5);
    }

    #[tokio::test]
    async fn test_reset_only_touches_caller_queue() {
        let owner_x = Uuid::new_v4();
        let owner_y = Uuid::new_v4();
        let repo = InMemoryTicketRepository::new();
        let service = TicketService::new(repo, QueueConfig::default());

        for _ in 0..5 {
            service
                .issue_ticket(
                    owner_x,
                    IssueTicket {
                        number: Some("1001".to_string()),
                        service_class: ServiceClass::Regular,
                        estimated_wait_minutes: Some(0),
                        priority_weight: None,
                    },
                )
                .await
                .unwrap();
        }
        for _ in 0..2 {
            service
                .issue_ticket(
                    owner_y,
                    IssueTicket {
                        number: Some("P01".to_string()),
                        service_class: ServiceClass::Priority,
                        estimated_wait_minutes: Some(0),
                        priority_weight: None,
                    },
                )
                .await
                .unwrap();
        }

        let outcome = service.reset_queue(owner_x).await.unwrap();
        assert_eq!(outcome.deleted, 5);
        assert!(service.list_tickets(owner_x).await.unwrap().is_empty());
        assert_eq!(service.list_tickets(owner_y).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_queue_stats_over_live_queue() {
        let owner = Uuid::new_v4();
        let repo = InMemoryTicketRepository::new();
        let service = TicketService::new(repo, QueueConfig::default());

        service
            .issue_ticket(
                owner,
                IssueTicket {
                    number: None,
                    service_class: ServiceClass::Regular,
                    estimated_wait_minutes: None,
                    priority_weight: None,
                },
            )
            .await
            .unwrap();
        service
            .issue_ticket(
                owner,
                IssueTicket {
                    number: None,
                    service_class: ServiceClass::Priority,
                    estimated_wait_minutes: None,
                    priority_weight: None,
                },
            )
            .await
            .unwrap();

        let called = service.call_next(owner).await.unwrap();
        assert_eq!(called.service_class, ServiceClass::Priority);

        let stats = service.queue_stats(owner).await.unwrap();
        assert_eq!(stats.waiting.len(), 1);
        assert_eq!(stats.regular.waiting, 1);
        assert_eq!(stats.priority.waiting, 0);
        assert_eq!(stats.now_serving.map(|t| t.id), Some(called.id));
    }
}
