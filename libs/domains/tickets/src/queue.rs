//! Pure queue logic: serve ordering, wait-time estimation, display counters,
//! and derived dashboard statistics.
//!
//! Everything here operates on already-materialized ticket lists; no I/O.
//! The service layer composes these functions with repository calls, and the
//! repository implementations mirror [`serve_order`] when they sort in the
//! store.

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use core_config::{ConfigError, FromEnv, env_parse_or_default};
use serde::Serialize;
use std::cmp::Ordering;
use utoipa::ToSchema;

use crate::models::{ServiceClass, Ticket, TicketStatus};

/// First regular display number of each day
pub const REGULAR_COUNTER_BASE: i64 = 1001;

/// First priority display number of each day
pub const PRIORITY_COUNTER_BASE: i64 = 1;

/// Queue tuning: average service time per class, in minutes.
///
/// These feed the wait estimator. Loaded from the environment:
/// - `QUEUE_REGULAR_AVG_MINUTES` (default: 8)
/// - `QUEUE_PRIORITY_AVG_MINUTES` (default: 5)
#[derive(Clone, Debug)]
pub struct QueueConfig {
    pub regular_avg_service_minutes: i64,
    pub priority_avg_service_minutes: i64,
}

impl QueueConfig {
    fn avg_service_minutes(&self, class: ServiceClass) -> i64 {
        match class {
            ServiceClass::Regular => self.regular_avg_service_minutes,
            ServiceClass::Priority => self.priority_avg_service_minutes,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            regular_avg_service_minutes: 8,
            priority_avg_service_minutes: 5,
        }
    }
}

impl FromEnv for QueueConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            regular_avg_service_minutes: env_parse_or_default("QUEUE_REGULAR_AVG_MINUTES", 8)?,
            priority_avg_service_minutes: env_parse_or_default("QUEUE_PRIORITY_AVG_MINUTES", 5)?,
        })
    }
}

/// Estimate the wait in minutes for a new ticket of `class`, given the
/// owner's current waiting set.
///
/// Priority tickets preempt regular ones, so every waiting priority ticket
/// delays any newcomer; waiting regular tickets only delay other regular
/// tickets.
pub fn estimate_wait(config: &QueueConfig, waiting: &[Ticket], class: ServiceClass) -> i64 {
    let priority_ahead = waiting
        .iter()
        .filter(|t| t.service_class == ServiceClass::Priority)
        .count() as i64;

    let priority_delay = priority_ahead * config.avg_service_minutes(ServiceClass::Priority);

    match class {
        ServiceClass::Priority => priority_delay,
        ServiceClass::Regular => {
            let regular_ahead = waiting
                .iter()
                .filter(|t| t.service_class == ServiceClass::Regular)
                .count() as i64;

            priority_delay + regular_ahead * config.avg_service_minutes(ServiceClass::Regular)
        }
    }
}

/// Total serve order over waiting tickets: highest `priority_weight` first,
/// then earliest `issued_at`, then smallest id.
///
/// Ids are time-ordered UUIDs, so the final tie-break is deterministic even
/// for tickets issued in the same instant.
pub fn serve_order(a: &Ticket, b: &Ticket) -> Ordering {
    b.priority_weight
        .cmp(&a.priority_weight)
        .then_with(|| a.issued_at.cmp(&b.issued_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort tickets into serve order in place
pub fn sort_into_serve_order(tickets: &mut [Ticket]) {
    tickets.sort_by(serve_order);
}

/// The next ticket to call from a waiting set, by [`serve_order`]
pub fn next_in_line(waiting: &[Ticket]) -> Option<&Ticket> {
    waiting
        .iter()
        .filter(|t| t.status == TicketStatus::Waiting)
        .min_by(|a, b| serve_order(a, b))
}

/// Render a display number for a ticket of `class` with day-sequence
/// `sequence` (counter base already applied).
///
/// Regular numbers render as-is; priority numbers get a `P` prefix and
/// two-digit zero padding (`P01`, `P12`).
pub fn display_number(class: ServiceClass, sequence: i64) -> String {
    match class {
        ServiceClass::Regular => sequence.to_string(),
        ServiceClass::Priority => format!("P{:02}", sequence),
    }
}

/// The UTC instant at which the current local day began.
///
/// Counters reset at local midnight, matching what a dashboard user expects
/// of "today's tickets".
pub fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    let midnight = local.date_naive().and_time(NaiveTime::MIN);

    // A DST jump can make local midnight ambiguous or nonexistent; take the
    // earliest valid instant, or fall back to `now` itself.
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(now)
}

/// Per-class waiting/completed counts
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct ClassStats {
    pub waiting: u64,
    pub completed: u64,
}

/// Derived dashboard statistics for one owner's queue.
///
/// Computed from the full ticket list; the store remains authoritative and
/// clients should refetch rather than patch these locally.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QueueStats {
    /// Waiting tickets in serve order
    pub waiting: Vec<Ticket>,
    /// The most recently called ticket still being served
    pub now_serving: Option<Ticket>,
    /// Rounded mean of `estimated_wait_minutes` over the waiting set
    pub avg_wait_minutes: i64,
    pub regular: ClassStats,
    pub priority: ClassStats,
    /// Total completed tickets
    pub completed: u64,
    /// Total no-show tickets
    pub no_show: u64,
}

impl QueueStats {
    /// Derive statistics from an owner's tickets.
    pub fn derive(tickets: &[Ticket]) -> Self {
        let mut waiting: Vec<Ticket> = tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Waiting)
            .cloned()
            .collect();
        sort_into_serve_order(&mut waiting);

        let now_serving = tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Serving)
            .max_by(|a, b| {
                a.served_at
                    .cmp(&b.served_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned();

        let avg_wait_minutes = if waiting.is_empty() {
            0
        } else {
            let total: i64 = waiting.iter().map(|t| t.estimated_wait_minutes).sum();
            (total as f64 / waiting.len() as f64).round() as i64
        };

        let class_stats = |class: ServiceClass| ClassStats {
            waiting: count_by(tickets, class, TicketStatus::Waiting),
            completed: count_by(tickets, class, TicketStatus::Completed),
        };

        Self {
            avg_wait_minutes,
            regular: class_stats(ServiceClass::Regular),
            priority: class_stats(ServiceClass::Priority),
            completed: tickets
                .iter()
                .filter(|t| t.status == TicketStatus::Completed)
                .count() as u64,
            no_show: tickets
                .iter()
                .filter(|t| t.status == TicketStatus::NoShow)
                .count() as u64,
            waiting,
            now_serving,
        }
    }
}

fn count_by(tickets: &[Ticket], class: ServiceClass, status: TicketStatus) -> u64 {
    tickets
        .iter()
        .filter(|t| t.service_class == class && t.status == status)
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn ticket_at(class: ServiceClass, issued_at: DateTime<Utc>) -> Ticket {
        let mut ticket = Ticket::issue(
            Uuid::new_v4(),
            "t".to_string(),
            class,
            class.priority_weight(),
            0,
        );
        ticket.issued_at = issued_at;
        ticket
    }

    fn waiting_set(classes: &[ServiceClass]) -> Vec<Ticket> {
        let base = Utc::now();
        classes
            .iter()
            .enumerate()
            .map(|(i, &class)| ticket_at(class, base + Duration::minutes(i as i64)))
            .collect()
    }

    #[test]
    fn test_estimate_regular_behind_mixed_queue() {
        // Two priority and one regular ahead: 2*5 + 1*8 = 18
        let waiting = waiting_set(&[
            ServiceClass::Priority,
            ServiceClass::Priority,
            ServiceClass::Regular,
        ]);

        let config = QueueConfig::default();
        assert_eq!(
            estimate_wait(&config, &waiting, ServiceClass::Regular),
            18
        );
    }

    #[test]
    fn test_estimate_priority_ignores_regular_queue() {
        // One priority ahead: 1*5; the regular tickets do not matter
        let waiting = waiting_set(&[
            ServiceClass::Priority,
            ServiceClass::Regular,
            ServiceClass::Regular,
        ]);

        let config = QueueConfig::default();
        assert_eq!(
            estimate_wait(&config, &waiting, ServiceClass::Priority),
            5
        );
    }

    #[test]
    fn test_estimate_empty_queue_is_zero() {
        let config = QueueConfig::default();
        assert_eq!(estimate_wait(&config, &[], ServiceClass::Regular), 0);
        assert_eq!(estimate_wait(&config, &[], ServiceClass::Priority), 0);
    }

    #[test]
    fn test_estimate_monotonic_in_queue_length() {
        let config = QueueConfig::default();
        let mut waiting = Vec::new();
        let mut last_priority = -1;
        let mut last_regular = -1;

        for _ in 0..10 {
            waiting.push(ticket_at(ServiceClass::Priority, Utc::now()));
            let p = estimate_wait(&config, &waiting, ServiceClass::Priority);
            let r = estimate_wait(&config, &waiting, ServiceClass::Regular);
            assert!(p > last_priority);
            assert!(r > last_regular);
            last_priority = p;
            last_regular = r;
        }

        // Growing the regular backlog moves regular estimates only
        for _ in 0..10 {
            waiting.push(ticket_at(ServiceClass::Regular, Utc::now()));
            let p = estimate_wait(&config, &waiting, ServiceClass::Priority);
            let r = estimate_wait(&config, &waiting, ServiceClass::Regular);
            assert_eq!(p, last_priority);
            assert!(r > last_regular);
            last_regular = r;
        }
    }

    #[test]
    fn test_estimate_uses_configured_averages() {
        let config = QueueConfig {
            regular_avg_service_minutes: 10,
            priority_avg_service_minutes: 2,
        };
        let waiting = waiting_set(&[ServiceClass::Priority, ServiceClass::Regular]);

        assert_eq!(estimate_wait(&config, &waiting, ServiceClass::Regular), 12);
        assert_eq!(estimate_wait(&config, &waiting, ServiceClass::Priority), 2);
    }

    #[test]
    fn test_serve_order_priority_beats_arrival_order() {
        let t1 = Utc::now();
        let regular = ticket_at(ServiceClass::Regular, t1);
        let priority = ticket_at(ServiceClass::Priority, t1 + Duration::minutes(5));

        let waiting = vec![regular.clone(), priority.clone()];
        let next = next_in_line(&waiting).unwrap();
        assert_eq!(next.id, priority.id);
    }

    #[test]
    fn test_serve_order_fifo_within_class() {
        let t1 = Utc::now();
        let first = ticket_at(ServiceClass::Regular, t1);
        let second = ticket_at(ServiceClass::Regular, t1 + Duration::seconds(1));

        let mut waiting = vec![second.clone(), first.clone()];
        sort_into_serve_order(&mut waiting);
        assert_eq!(waiting[0].id, first.id);
        assert_eq!(waiting[1].id, second.id);
    }

    #[test]
    fn test_serve_order_breaks_timestamp_ties_by_id() {
        let t1 = Utc::now();
        let a = ticket_at(ServiceClass::Regular, t1);
        let b = ticket_at(ServiceClass::Regular, t1);

        let mut forward = vec![a.clone(), b.clone()];
        let mut backward = vec![b.clone(), a.clone()];
        sort_into_serve_order(&mut forward);
        sort_into_serve_order(&mut backward);

        // Same order regardless of input order
        assert_eq!(forward[0].id, backward[0].id);
        assert_eq!(forward[1].id, backward[1].id);
        assert!(forward[0].id < forward[1].id);
    }

    #[test]
    fn test_next_in_line_skips_non_waiting() {
        let t1 = Utc::now();
        let mut serving = ticket_at(ServiceClass::Priority, t1);
        serving.transition_to(TicketStatus::Serving, t1);
        let waiting = ticket_at(ServiceClass::Regular, t1 + Duration::minutes(1));

        let tickets = vec![serving, waiting.clone()];
        assert_eq!(next_in_line(&tickets).unwrap().id, waiting.id);
    }

    #[test]
    fn test_next_in_line_empty() {
        assert!(next_in_line(&[]).is_none());
    }

    #[test]
    fn test_display_number_formats() {
        assert_eq!(display_number(ServiceClass::Regular, 1004), "1004");
        assert_eq!(display_number(ServiceClass::Priority, 1), "P01");
        assert_eq!(display_number(ServiceClass::Priority, 12), "P12");
        assert_eq!(display_number(ServiceClass::Priority, 103), "P103");
    }

    #[test]
    fn test_start_of_local_day_is_before_now_and_same_day() {
        let now = Utc::now();
        let start = start_of_local_day(now);

        assert!(start <= now);
        assert_eq!(
            start.with_timezone(&Local).date_naive(),
            now.with_timezone(&Local).date_naive()
        );
        assert_eq!(
            start.with_timezone(&Local).time(),
            NaiveTime::MIN
        );
    }

    #[test]
    fn test_queue_config_from_env() {
        temp_env::with_vars(
            [
                ("QUEUE_REGULAR_AVG_MINUTES", Some("12")),
                ("QUEUE_PRIORITY_AVG_MINUTES", Some("3")),
            ],
            || {
                let config = QueueConfig::from_env().unwrap();
                assert_eq!(config.regular_avg_service_minutes, 12);
                assert_eq!(config.priority_avg_service_minutes, 3);
            },
        );

        temp_env::with_vars(
            [
                ("QUEUE_REGULAR_AVG_MINUTES", None::<&str>),
                ("QUEUE_PRIORITY_AVG_MINUTES", None),
            ],
            || {
                let config = QueueConfig::from_env().unwrap();
                assert_eq!(config.regular_avg_service_minutes, 8);
                assert_eq!(config.priority_avg_service_minutes, 5);
            },
        );
    }

    #[test]
    fn test_stats_derivation() {
        let t0 = Utc::now();
        let mut tickets = vec![
            ticket_at(ServiceClass::Regular, t0),
            ticket_at(ServiceClass::Priority, t0 + Duration::minutes(1)),
            ticket_at(ServiceClass::Regular, t0 + Duration::minutes(2)),
        ];
        tickets[0].estimated_wait_minutes = 10;
        tickets[1].estimated_wait_minutes = 5;
        tickets[2].estimated_wait_minutes = 18;

        // One more ticket already being served, one completed, one no-show
        let mut serving = ticket_at(ServiceClass::Regular, t0 - Duration::minutes(10));
        serving.transition_to(TicketStatus::Serving, t0);
        let mut completed = ticket_at(ServiceClass::Priority, t0 - Duration::minutes(20));
        completed.transition_to(TicketStatus::Serving, t0 - Duration::minutes(15));
        completed.transition_to(TicketStatus::Completed, t0 - Duration::minutes(12));
        let mut no_show = ticket_at(ServiceClass::Regular, t0 - Duration::minutes(30));
        no_show.transition_to(TicketStatus::Serving, t0 - Duration::minutes(25));
        no_show.transition_to(TicketStatus::NoShow, t0 - Duration::minutes(24));

        let serving_id = serving.id;
        tickets.extend([serving, completed, no_show]);

        let stats = QueueStats::derive(&tickets);

        // Waiting list is in serve order: the priority ticket leads
        assert_eq!(stats.waiting.len(), 3);
        assert_eq!(stats.waiting[0].service_class, ServiceClass::Priority);

        assert_eq!(stats.now_serving.as_ref().map(|t| t.id), Some(serving_id));
        // round((10 + 5 + 18) / 3) = 11
        assert_eq!(stats.avg_wait_minutes, 11);
        assert_eq!(stats.regular.waiting, 2);
        assert_eq!(stats.priority.waiting, 1);
        assert_eq!(stats.priority.completed, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.no_show, 1);
    }

    #[test]
    fn test_stats_empty_queue() {
        let stats = QueueStats::derive(&[]);
        assert!(stats.waiting.is_empty());
        assert!(stats.now_serving.is_none());
        assert_eq!(stats.avg_wait_minutes, 0);
        assert_eq!(stats.regular.waiting, 0);
        assert_eq!(stats.priority.waiting, 0);
    }

    #[test]
    fn test_stats_now_serving_picks_latest_called() {
        let t0 = Utc::now();
        let mut early = ticket_at(ServiceClass::Regular, t0 - Duration::minutes(30));
        early.transition_to(TicketStatus::Serving, t0 - Duration::minutes(20));
        let mut late = ticket_at(ServiceClass::Regular, t0 - Duration::minutes(25));
        late.transition_to(TicketStatus::Serving, t0 - Duration::minutes(5));

        let late_id = late.id;
        let stats = QueueStats::derive(&[early, late]);
        assert_eq!(stats.now_serving.map(|t| t.id), Some(late_id));
    }
}
