//! HTTP API layer for pollhub.
//!
//! - **Endpoints**: users, auth, organizations, invites, polls, choices, uploads
//! - **Extractors**: bearer authentication
//! - **Middleware**: token resolution into the authenticated user
//! - **Responses**: the `{"data": ...}` envelope; errors render through `AppError`
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod form;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::{AppState, auth_middleware};
