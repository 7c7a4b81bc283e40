//! Extractor for the authenticated user.

use super::jwt::JwtClaims;
use crate::errors::AppError;
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

/// The verified identity attached to a request.
///
/// Populated from the [`JwtClaims`] that
/// [`jwt_auth_middleware`](super::jwt_auth_middleware) inserts into request
/// extensions. Handlers that take an `AuthUser` therefore only run behind
/// the auth layer; everything downstream can trust `id`.
///
/// # Example
/// ```ignore
/// async fn list_tickets(user: AuthUser) -> ... {
///     service.list_tickets(user.id).await
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<JwtClaims>().ok_or_else(|| {
            AppError::Unauthorized("Authentication required".to_string()).into_response()
        })?;

        let id = Uuid::parse_str(&claims.sub).map_err(|_| {
            AppError::Unauthorized("Invalid subject claim".to_string()).into_response()
        })?;

        Ok(AuthUser { id })
    }
}
