use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Service class, determining queue precedence
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceClass {
    /// Standard queue
    #[default]
    Regular,
    /// Fast track, always served before regular tickets
    Priority,
}

impl ServiceClass {
    /// Sort weight used for serve ordering; priority preempts regular
    pub fn priority_weight(self) -> i32 {
        match self {
            ServiceClass::Priority => 1,
            ServiceClass::Regular => 0,
        }
    }
}

/// Ticket lifecycle status
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    ToSchema,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TicketStatus {
    /// In the queue, not yet called
    #[default]
    Waiting,
    /// Called to a counter
    Serving,
    /// Service finished
    Completed,
    /// Called but never showed up
    NoShow,
}

impl TicketStatus {
    /// Legal lifecycle moves: waiting → serving → {completed | no-show}.
    /// Backward jumps and self-transitions are rejected.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Waiting, TicketStatus::Serving)
                | (TicketStatus::Serving, TicketStatus::Completed)
                | (TicketStatus::Serving, TicketStatus::NoShow)
        )
    }

    /// Whether this status ends the lifecycle
    pub fn is_terminal(self) -> bool {
        matches!(self, TicketStatus::Completed | TicketStatus::NoShow)
    }
}

/// Ticket entity - a single queue position, stored in MongoDB
///
/// The store-assigned `id` is the only true identity; `number` is a
/// human-facing label reconstructable from the counter rule.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Ticket {
    /// Unique identifier (stored as _id in MongoDB)
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    /// Owner of the queue this ticket belongs to; immutable
    pub owner_id: Uuid,
    /// Display label, e.g. "1004" or "P01"
    pub number: String,
    /// Service class; immutable
    pub service_class: ServiceClass,
    /// Current lifecycle status
    pub status: TicketStatus,
    /// Sort weight, 1 for priority and 0 for regular
    pub priority_weight: i32,
    /// Wait estimate computed at issuance; never recomputed
    pub estimated_wait_minutes: i64,
    /// Issuance timestamp; immutable
    pub issued_at: DateTime<Utc>,
    /// Set when the ticket is called to a counter
    pub served_at: Option<DateTime<Utc>>,
    /// Set when service completes
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when the customer never showed up
    pub no_show_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Create a new waiting ticket owned by `owner_id`
    pub fn issue(
        owner_id: Uuid,
        number: String,
        service_class: ServiceClass,
        priority_weight: i32,
        estimated_wait_minutes: i64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner_id,
            number,
            service_class,
            status: TicketStatus::Waiting,
            priority_weight,
            estimated_wait_minutes,
            issued_at: Utc::now(),
            served_at: None,
            completed_at: None,
            no_show_at: None,
        }
    }

    /// Move to `next` and stamp the matching transition timestamp.
    ///
    /// The caller is responsible for checking
    /// [`TicketStatus::can_transition_to`] first; this method only records
    /// the move.
    pub fn transition_to(&mut self, next: TicketStatus, at: DateTime<Utc>) {
        self.status = next;
        match next {
            TicketStatus::Serving => self.served_at = Some(at),
            TicketStatus::Completed => self.completed_at = Some(at),
            TicketStatus::NoShow => self.no_show_at = Some(at),
            TicketStatus::Waiting => {}
        }
    }
}

/// DTO for issuing a new ticket
///
/// `number` and `estimated_wait_minutes` may be supplied by the caller (the
/// dashboard precomputes them from its counters); when omitted the service
/// derives both from the owner's current queue state.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct IssueTicket {
    /// Display label; derived from the day counter when omitted
    #[validate(length(min = 1, max = 16))]
    pub number: Option<String>,
    /// Service class of the new ticket
    #[serde(alias = "type")]
    pub service_class: ServiceClass,
    /// Wait estimate in minutes; computed from the waiting set when omitted
    #[validate(range(min = 0))]
    pub estimated_wait_minutes: Option<i64>,
    /// Sort weight override; defaults from the service class
    #[validate(range(min = 0, max = 1))]
    pub priority_weight: Option<i32>,
}

/// DTO for updating a ticket's lifecycle state
///
/// Only supplied fields are applied; everything else keeps its prior value.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTicket {
    /// New status; must be a legal lifecycle move from the current one
    pub status: Option<TicketStatus>,
    pub served_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub no_show_at: Option<DateTime<Utc>>,
}

/// Per-class display counters since the start of the current local day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Counters {
    /// Next regular display number (base 1001)
    pub regular: i64,
    /// Next priority display number (base 1)
    pub priority: i64,
}

/// Outcome of a queue reset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ResetOutcome {
    /// Number of tickets removed
    pub deleted: u64,
}

/// Plain confirmation message for destructive operations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Confirmation {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_class_wire_values() {
        assert_eq!(
            serde_json::to_string(&ServiceClass::Regular).unwrap(),
            "\"regular\""
        );
        assert_eq!(
            serde_json::to_string(&ServiceClass::Priority).unwrap(),
            "\"priority\""
        );

        let parsed: ServiceClass = serde_json::from_str("\"priority\"").unwrap();
        assert_eq!(parsed, ServiceClass::Priority);
    }

    #[test]
    fn test_service_class_rejects_unknown_value() {
        let parsed: Result<ServiceClass, _> = serde_json::from_str("\"express\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_status_wire_values() {
        assert_eq!(
            serde_json::to_string(&TicketStatus::NoShow).unwrap(),
            "\"no-show\""
        );
        assert_eq!(
            serde_json::to_string(&TicketStatus::Waiting).unwrap(),
            "\"waiting\""
        );

        let parsed: TicketStatus = serde_json::from_str("\"no-show\"").unwrap();
        assert_eq!(parsed, TicketStatus::NoShow);
    }

    #[test]
    fn test_priority_weight_per_class() {
        assert_eq!(ServiceClass::Priority.priority_weight(), 1);
        assert_eq!(ServiceClass::Regular.priority_weight(), 0);
    }

    #[test]
    fn test_lifecycle_transitions() {
        use TicketStatus::*;

        assert!(Waiting.can_transition_to(Serving));
        assert!(Serving.can_transition_to(Completed));
        assert!(Serving.can_transition_to(NoShow));

        // Skipping the serving step is not allowed
        assert!(!Waiting.can_transition_to(Completed));
        assert!(!Waiting.can_transition_to(NoShow));

        // No backward moves or self-transitions
        assert!(!Serving.can_transition_to(Waiting));
        assert!(!Completed.can_transition_to(Serving));
        assert!(!Completed.can_transition_to(Waiting));
        assert!(!NoShow.can_transition_to(Completed));
        assert!(!Waiting.can_transition_to(Waiting));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TicketStatus::Completed.is_terminal());
        assert!(TicketStatus::NoShow.is_terminal());
        assert!(!TicketStatus::Waiting.is_terminal());
        assert!(!TicketStatus::Serving.is_terminal());
    }

    #[test]
    fn test_issue_starts_waiting_with_clear_timestamps() {
        let owner = Uuid::new_v4();
        let ticket = Ticket::issue(owner, "1001".to_string(), ServiceClass::Regular, 0, 0);

        assert_eq!(ticket.owner_id, owner);
        assert_eq!(ticket.status, TicketStatus::Waiting);
        assert!(ticket.served_at.is_none());
        assert!(ticket.completed_at.is_none());
        assert!(ticket.no_show_at.is_none());
    }

    #[test]
    fn test_transition_stamps_matching_timestamp() {
        let mut ticket = Ticket::issue(
            Uuid::new_v4(),
            "P01".to_string(),
            ServiceClass::Priority,
            1,
            5,
        );

        let t1 = Utc::now();
        ticket.transition_to(TicketStatus::Serving, t1);
        assert_eq!(ticket.status, TicketStatus::Serving);
        assert_eq!(ticket.served_at, Some(t1));
        assert!(ticket.completed_at.is_none());

        let t2 = Utc::now();
        ticket.transition_to(TicketStatus::Completed, t2);
        assert_eq!(ticket.status, TicketStatus::Completed);
        assert_eq!(ticket.completed_at, Some(t2));
        // served_at survives completion; it records when service began
        assert_eq!(ticket.served_at, Some(t1));
    }

    #[test]
    fn test_ticket_round_trips_through_serde() {
        let ticket = Ticket::issue(
            Uuid::new_v4(),
            "1001".to_string(),
            ServiceClass::Regular,
            0,
            18,
        );

        let json = serde_json::to_string(&ticket).unwrap();
        assert!(json.contains("\"_id\""));

        let parsed: Ticket = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, ticket.id);
        assert_eq!(parsed.number, ticket.number);
        assert_eq!(parsed.estimated_wait_minutes, 18);
    }
}
