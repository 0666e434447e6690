//! Poll endpoints: lifecycle, voting and results.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::{DateTime, FixedOffset, Utc};
use pollhub_common::AppResult;
use pollhub_core::{CastVoteInput, CreatePollInput, PollDetail, PollResults, UpdatePollInput};
use pollhub_db::entities::{
    poll::{self, PollStatus, PollType, ResultDisplayType},
    poll_vote,
};
use serde::Serialize;

use super::choices::ChoiceResponse;
use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Poll response. `status` is the status observed at response time.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_by: String,
    pub organization_id: Option<String>,
    #[serde(rename = "type")]
    pub poll_type: PollType,
    pub result_display_type: ResultDisplayType,
    pub status: PollStatus,
    pub voting_ends_at: DateTime<FixedOffset>,
    pub allow_multiple_choices: bool,
    pub is_active: bool,
    pub is_voting_active: bool,
    pub is_voting_ended: bool,
    pub main_image_url: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl PollResponse {
    pub fn new(p: poll::Model, now: DateTime<Utc>) -> Self {
        Self {
            status: p.effective_status(now),
            is_voting_active: p.is_voting_active(now),
            is_voting_ended: p.is_voting_ended(now),
            id: p.id,
            title: p.title,
            description: p.description,
            created_by: p.created_by,
            organization_id: p.organization_id,
            poll_type: p.poll_type,
            result_display_type: p.result_display_type,
            voting_ends_at: p.voting_ends_at,
            allow_multiple_choices: p.allow_multiple_choices,
            is_active: p.is_active,
            main_image_url: p.main_image_url,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Poll page: poll, choices, the caller's votes and visible results.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollDetailResponse {
    #[serde(flatten)]
    pub poll: PollResponse,
    pub can_view_results: bool,
    pub choices: Vec<ChoiceResponse>,
    pub my_votes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<PollResults>,
}

impl From<PollDetail> for PollDetailResponse {
    fn from(d: PollDetail) -> Self {
        let mut poll = PollResponse::new(d.poll, Utc::now());
        poll.status = d.effective_status;
        poll.is_voting_active = d.is_voting_active;
        poll.is_voting_ended = d.is_voting_ended;

        Self {
            poll,
            can_view_results: d.can_view_results,
            choices: d.choices.into_iter().map(Into::into).collect(),
            my_votes: d.my_votes,
            results: d.results,
        }
    }
}

/// Vote response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub id: String,
    pub poll_id: String,
    pub choice_id: String,
    pub user_id: String,
    pub voted_at: DateTime<FixedOffset>,
}

impl From<poll_vote::Model> for VoteResponse {
    fn from(v: poll_vote::Model) -> Self {
        Self {
            id: v.id,
            poll_id: v.poll_id,
            choice_id: v.choice_id,
            user_id: v.user_id,
            voted_at: v.voted_at,
        }
    }
}

/// Create a DRAFT poll.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePollInput>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.create(&user.id, req).await?;
    Ok(ApiResponse::created(PollResponse::new(poll, Utc::now())))
}

async fn public(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PollResponse>>> {
    let now = Utc::now();
    let polls = state.poll_service.list_public().await?;
    Ok(ApiResponse::ok(
        polls.into_iter().map(|p| PollResponse::new(p, now)).collect(),
    ))
}

async fn mine(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PollResponse>>> {
    let now = Utc::now();
    let polls = state.poll_service.list_mine(&user.id).await?;
    Ok(ApiResponse::ok(
        polls.into_iter().map(|p| PollResponse::new(p, now)).collect(),
    ))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollDetailResponse>> {
    let detail = state.poll_service.get_detail(&id, &user.id).await?;
    Ok(ApiResponse::ok(detail.into()))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePollInput>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.update(&id, &user.id, req).await?;
    Ok(ApiResponse::ok(PollResponse::new(poll, Utc::now())))
}

async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.poll_service.delete(&id, &user.id).await?;
    Ok(no_content())
}

async fn activate(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.activate(&id, &user.id).await?;
    Ok(ApiResponse::ok(PollResponse::new(poll, Utc::now())))
}

async fn end(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.end(&id, &user.id).await?;
    Ok(ApiResponse::ok(PollResponse::new(poll, Utc::now())))
}

async fn cancel(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollResponse>> {
    let poll = state.poll_service.cancel(&id, &user.id).await?;
    Ok(ApiResponse::ok(PollResponse::new(poll, Utc::now())))
}

/// Cast a ballot of one or more choices.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CastVoteInput>,
) -> AppResult<ApiResponse<Vec<VoteResponse>>> {
    let votes = state.poll_service.vote(&id, &user.id, req).await?;
    Ok(ApiResponse::created(
        votes.into_iter().map(Into::into).collect(),
    ))
}

async fn results(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PollResults>> {
    let results = state.poll_service.results(&id, &user.id).await?;
    Ok(ApiResponse::ok(results))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/public", get(public))
        .route("/my-polls", get(mine))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/activate", put(activate))
        .route("/{id}/end", put(end))
        .route("/{id}/cancel", put(cancel))
        .route("/{id}/votes", post(vote))
        .route("/{id}/results", get(results))
}
