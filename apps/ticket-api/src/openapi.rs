//! OpenAPI documentation configuration

use utoipa::OpenApi;

/// Combined OpenAPI documentation for all APIs
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ticket API",
        version = "0.1.0",
        description = "Queue ticketing REST API: per-user ticket queues with regular and priority service classes",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api/tickets", api = domain_tickets::ApiDoc)
    ),
    tags(
        (name = "Tickets", description = "Ticket issuance, serving, and queue statistics")
    )
)]
pub struct ApiDoc;
