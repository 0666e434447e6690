//! Organization endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use chrono::{DateTime, FixedOffset, Utc};
use pollhub_common::AppResult;
use pollhub_core::{CreateOrganizationInput, InviteUserInput, UpdateOrganizationInput};
use pollhub_db::entities::{
    organization::{self, OrganizationType},
    organization_member::{self, MemberRole, MemberStatus},
};
use serde::{Deserialize, Serialize};

use super::polls::PollResponse;
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Organization response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization_type: OrganizationType,
    pub is_active: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<organization::Model> for OrganizationResponse {
    fn from(o: organization::Model) -> Self {
        Self {
            id: o.id,
            name: o.name,
            description: o.description,
            website: o.website,
            email: o.email,
            phone: o.phone,
            organization_type: o.organization_type,
            is_active: o.is_active,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

/// Membership or invite response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: String,
    pub organization_id: String,
    pub user_id: String,
    pub role: MemberRole,
    pub status: MemberStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invited_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<FixedOffset>>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<organization_member::Model> for MemberResponse {
    fn from(m: organization_member::Model) -> Self {
        Self {
            id: m.id,
            organization_id: m.organization_id,
            user_id: m.user_id,
            role: m.role,
            status: m.status,
            invited_by: m.invited_by,
            invited_at: m.invited_at,
            joined_at: m.joined_at,
            expires_at: m.expires_at,
            created_at: m.created_at,
        }
    }
}

/// Create an organization; the caller becomes its owner.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateOrganizationInput>,
) -> AppResult<ApiResponse<OrganizationResponse>> {
    let org = state.organization_service.create(&user.id, req).await?;
    Ok(ApiResponse::created(org.into()))
}

async fn list(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<OrganizationResponse>>> {
    let orgs = state.organization_service.list().await?;
    Ok(ApiResponse::ok(orgs.into_iter().map(Into::into).collect()))
}

async fn show(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<OrganizationResponse>> {
    let org = state.organization_service.get(&id).await?;
    Ok(ApiResponse::ok(org.into()))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrganizationInput>,
) -> AppResult<ApiResponse<OrganizationResponse>> {
    let org = state.organization_service.update(&id, &user.id, req).await?;
    Ok(ApiResponse::ok(org.into()))
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.organization_service.delete(&id, &user.id).await?;
    Ok(no_content())
}

async fn activate(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<OrganizationResponse>> {
    let org = state.organization_service.activate(&id, &user.id).await?;
    Ok(ApiResponse::ok(org.into()))
}

async fn deactivate(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<OrganizationResponse>> {
    let org = state.organization_service.deactivate(&id, &user.id).await?;
    Ok(ApiResponse::ok(org.into()))
}

/// Invite a user; the invite stays PENDING until accepted, declined or expired.
async fn invite(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<InviteUserInput>,
) -> AppResult<ApiResponse<MemberResponse>> {
    let invite = state
        .organization_service
        .invite_user(&id, &user.id, req)
        .await?;
    Ok(ApiResponse::created(invite.into()))
}

async fn members(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<MemberResponse>>> {
    let members = state.organization_service.get_members(&id, &user.id).await?;
    Ok(ApiResponse::ok(members.into_iter().map(Into::into).collect()))
}

/// Update role request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub role: MemberRole,
}

async fn update_role(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((id, user_id)): Path<(String, String)>,
    Json(req): Json<UpdateRoleRequest>,
) -> AppResult<ApiResponse<MemberResponse>> {
    let member = state
        .organization_service
        .update_member_role(&id, &user_id, req.role, &user.id)
        .await?;
    Ok(ApiResponse::ok(member.into()))
}

async fn remove_member(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((id, user_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .organization_service
        .remove_member(&id, &user_id, &user.id)
        .await?;
    Ok(no_content())
}

/// Polls of an organization, for its members.
async fn polls(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<PollResponse>>> {
    let now = Utc::now();
    let polls = state
        .poll_service
        .list_for_organization(&id, &user.id)
        .await?;
    Ok(ApiResponse::ok(
        polls.into_iter().map(|p| PollResponse::new(p, now)).collect(),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/activate", put(activate))
        .route("/{id}/deactivate", put(deactivate))
        .route("/{id}/members", get(members))
        .route("/{id}/members/invite", post(invite))
        .route("/{id}/members/{user_id}/role", put(update_role))
        .route("/{id}/members/{user_id}", delete(remove_member))
        .route("/{id}/polls", get(polls))
}
