use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_helpers::{
    AuthUser, UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ForbiddenResponse,
        InternalServerErrorResponse, NotFoundResponse, UnauthorizedResponse,
    },
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::TicketResult;
use crate::models::{Confirmation, Counters, IssueTicket, ResetOutcome, Ticket, UpdateTicket};
use crate::queue::{ClassStats, QueueStats};
use crate::repository::TicketRepository;
use crate::service::TicketService;

/// OpenAPI documentation for the Tickets API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_tickets,
        issue_ticket,
        update_ticket,
        delete_ticket,
        get_counters,
        call_next,
        queue_stats,
        reset_queue,
    ),
    components(
        schemas(
            Ticket,
            IssueTicket,
            UpdateTicket,
            Counters,
            ResetOutcome,
            Confirmation,
            QueueStats,
            ClassStats
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            UnauthorizedResponse,
            ForbiddenResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Tickets", description = "Per-user queue ticketing endpoints")
    )
)]
pub struct ApiDoc;

/// Create the tickets router with all HTTP endpoints.
///
/// Every route expects a verified identity; mount this behind the JWT
/// middleware so the [`AuthUser`] extractor can resolve the caller.
pub fn router<R: TicketRepository + 'static>(service: TicketService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_tickets).post(issue_ticket))
        .route("/counters", get(get_counters))
        .route("/stats", get(queue_stats))
        .route("/next", post(call_next))
        .route("/reset", delete(reset_queue))
        .route("/{id}", put(update_ticket).delete(delete_ticket))
        .with_state(shared_service)
}

/// List the caller's tickets, oldest first
#[utoipa::path(
    get,
    path = "",
    tag = "Tickets",
    responses(
        (status = 200, description = "The caller's tickets, issuance order", body = Vec<Ticket>),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_tickets<R: TicketRepository>(
    State(service): State<Arc<TicketService<R>>>,
    user: AuthUser,
) -> TicketResult<Json<Vec<Ticket>>> {
    let tickets = service.list_tickets(user.id).await?;
    Ok(Json(tickets))
}

/// Issue a new ticket into the caller's queue
#[utoipa::path(
    post,
    path = "",
    tag = "Tickets",
    request_body = IssueTicket,
    responses(
        (status = 201, description = "Ticket issued", body = Ticket),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn issue_ticket<R: TicketRepository>(
    State(service): State<Arc<TicketService<R>>>,
    user: AuthUser,
    ValidatedJson(input): ValidatedJson<IssueTicket>,
) -> TicketResult<impl IntoResponse> {
    let ticket = service.issue_ticket(user.id, input).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Update a ticket's lifecycle state
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Tickets",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    request_body = UpdateTicket,
    responses(
        (status = 200, description = "Ticket updated", body = Ticket),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_ticket<R: TicketRepository>(
    State(service): State<Arc<TicketService<R>>>,
    user: AuthUser,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateTicket>,
) -> TicketResult<Json<Ticket>> {
    let ticket = service.update_ticket(user.id, id, input).await?;
    Ok(Json(ticket))
}

/// Delete a ticket
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Tickets",
    params(
        ("id" = Uuid, Path, description = "Ticket ID")
    ),
    responses(
        (status = 200, description = "Ticket deleted", body = Confirmation),
        (status = 400, response = BadRequestUuidResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 403, response = ForbiddenResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_ticket<R: TicketRepository>(
    State(service): State<Arc<TicketService<R>>>,
    user: AuthUser,
    UuidPath(id): UuidPath,
) -> TicketResult<Json<Confirmation>> {
    service.delete_ticket(user.id, id).await?;
    Ok(Json(Confirmation {
        message: "Ticket deleted".to_string(),
    }))
}

/// Today's display counters for the caller's queue
#[utoipa::path(
    get,
    path = "/counters",
    tag = "Tickets",
    responses(
        (status = 200, description = "Next display numbers per class", body = Counters),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_counters<R: TicketRepository>(
    State(service): State<Arc<TicketService<R>>>,
    user: AuthUser,
) -> TicketResult<Json<Counters>> {
    let counters = service.counters(user.id).await?;
    Ok(Json(counters))
}

/// Call the next waiting ticket to the counter
#[utoipa::path(
    post,
    path = "/next",
    tag = "Tickets",
    responses(
        (status = 200, description = "The claimed ticket, now serving", body = Ticket),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn call_next<R: TicketRepository>(
    State(service): State<Arc<TicketService<R>>>,
    user: AuthUser,
) -> TicketResult<Json<Ticket>> {
    let ticket = service.call_next(user.id).await?;
    Ok(Json(ticket))
}

/// Derived queue statistics for the caller's dashboard
#[utoipa::path(
    get,
    path = "/stats",
    tag = "Tickets",
    responses(
        (status = 200, description = "Derived queue statistics", body = QueueStats),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn queue_stats<R: TicketRepository>(
    State(service): State<Arc<TicketService<R>>>,
    user: AuthUser,
) -> TicketResult<Json<QueueStats>> {
    let stats = service.queue_stats(user.id).await?;
    Ok(Json(stats))
}

/// Remove every ticket in the caller's queue
#[utoipa::path(
    delete,
    path = "/reset",
    tag = "Tickets",
    responses(
        (status = 200, description = "Queue reset", body = ResetOutcome),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn reset_queue<R: TicketRepository>(
    State(service): State<Arc<TicketService<R>>>,
    user: AuthUser,
) -> TicketResult<Json<ResetOutcome>> {
    let outcome = service.reset_queue(user.id).await?;
    Ok(Json(outcome))
}
