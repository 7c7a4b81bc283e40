//! Authentication plumbing.
//!
//! Token issuance lives with the identity provider; this module only
//! verifies bearer credentials and hands the verified user id to handlers:
//! - Stateless JWT verification (HS256)
//! - Authentication middleware for protected routes
//! - The [`AuthUser`] extractor for handlers
//!
//! # Example
//!
//! ```ignore
//! use axum_helpers::auth::{JwtAuth, JwtConfig, jwt_auth_middleware};
//! use core_config::FromEnv;
//!
//! let config = JwtConfig::from_env()?;
//! let auth = JwtAuth::new(&config);
//!
//! let protected = Router::new()
//!     .route("/api/tickets", get(handler))
//!     .layer(axum::middleware::from_fn_with_state(auth, jwt_auth_middleware));
//! ```

pub mod config;
pub mod jwt;
pub mod middleware;
pub mod user;

// Re-export commonly used types
pub use config::JwtConfig;
pub use jwt::{JwtAuth, JwtClaims};
pub use middleware::jwt_auth_middleware;
pub use user::AuthUser;
