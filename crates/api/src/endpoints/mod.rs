//! API endpoints.

mod auth;
mod choices;
mod health;
mod invites;
mod organizations;
mod polls;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/users/me/organizations", invites::router())
        .nest("/organizations", organizations::router())
        .nest("/polls", polls::router().merge(choices::router()))
        .merge(health::router())
}
