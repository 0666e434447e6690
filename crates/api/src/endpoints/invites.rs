//! The caller's organizations and pending invites.

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, put},
};
use pollhub_common::AppResult;

use super::organizations::{MemberResponse, OrganizationResponse};
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Organizations the caller is an accepted member of.
async fn my_organizations(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<OrganizationResponse>>> {
    let orgs = state.organization_service.list_for_user(&user.id).await?;
    Ok(ApiResponse::ok(orgs.into_iter().map(Into::into).collect()))
}

/// Pending, unexpired invites addressed to the caller.
async fn pending(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<MemberResponse>>> {
    let invites = state
        .organization_service
        .list_pending_invites(&user.id)
        .await?;
    Ok(ApiResponse::ok(invites.into_iter().map(Into::into).collect()))
}

async fn accept(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<MemberResponse>> {
    let member = state.organization_service.accept_invite(&id, &user.id).await?;
    Ok(ApiResponse::ok(member.into()))
}

async fn decline(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<MemberResponse>> {
    let member = state.organization_service.decline_invite(&id, &user.id).await?;
    Ok(ApiResponse::ok(member.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(my_organizations))
        .route("/invites", get(pending))
        .route("/invites/{id}/accept", put(accept))
        .route("/invites/{id}/decline", put(decline))
}
