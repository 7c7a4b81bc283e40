//! Tickets API routes
//!
//! Wires the tickets domain to HTTP routes behind JWT authentication.

use axum::{Router, middleware};
use axum_helpers::{JwtAuth, jwt_auth_middleware};
use domain_tickets::{MongoTicketRepository, TicketService, handlers};

use crate::state::AppState;

/// Create the tickets router
pub fn router(state: &AppState) -> Router {
    // Create the MongoDB repository
    let repository = MongoTicketRepository::new(&state.db);

    // Create the service with the queue tuning from config
    let service = TicketService::new(repository, state.config.queue.clone());

    // Every ticket operation requires a verified identity
    let auth = JwtAuth::new(&state.config.jwt);

    handlers::router(service).layer(middleware::from_fn_with_state(auth, jwt_auth_middleware))
}

/// Initialize ticket indexes in MongoDB
pub async fn init_indexes(db: &mongodb::Database) -> eyre::Result<()> {
    let repository = MongoTicketRepository::new(db);
    repository
        .create_indexes()
        .await
        .map_err(|e| eyre::eyre!("Failed to create ticket indexes: {}", e))?;
    tracing::info!("Ticket collection indexes created");
    Ok(())
}
