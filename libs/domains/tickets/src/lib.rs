//! Tickets Domain
//!
//! A complete domain implementation for per-user queue ticketing backed by
//! MongoDB: ticket issuance, serve ordering, wait-time estimation, lifecycle
//! transitions, display counters, and queue statistics.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Ownership checks, lifecycle guards, orchestration
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (trait + MongoDB / in-memory impls)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │Models/Queue │  ← Entities, DTOs, pure queue logic
//! └─────────────┘
//! ```
//!
//! Queue ordering and wait-time estimation are pure functions in [`queue`];
//! the service composes them with repository operations. Every operation is
//! scoped to the verified owner id; queues are fully isolated per user.
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_tickets::{MongoTicketRepository, TicketService, handlers};
//! use domain_tickets::queue::QueueConfig;
//! use mongodb::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::with_uri_str("mongodb://localhost:27017").await?;
//! let db = client.database("queue");
//!
//! let repository = MongoTicketRepository::new(&db);
//! let service = TicketService::new(repository, QueueConfig::default());
//!
//! let router = handlers::router(service);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod mongodb;
pub mod queue;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use error::{TicketError, TicketResult};
pub use handlers::ApiDoc;
pub use models::{
    Counters, IssueTicket, ResetOutcome, ServiceClass, Ticket, TicketStatus, UpdateTicket,
};
pub use mongodb::MongoTicketRepository;
pub use queue::{QueueConfig, QueueStats};
pub use repository::{InMemoryTicketRepository, TicketRepository};
pub use service::TicketService;
