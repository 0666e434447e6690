//! Choice, media and upload endpoints. Mounted under `/polls`.

use axum::{
    Json, Router,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{StatusCode, header},
    routing::{delete, post, put},
};
use chrono::{DateTime, FixedOffset, Utc};
use pollhub_common::{AppError, AppResult};
use pollhub_core::{AddChoiceInput, ChoiceWithMedia, StoredFile, UpdateChoiceInput};
use pollhub_db::entities::{
    poll_choice::{self, MediaType},
    poll_choice_media,
};
use serde::Serialize;

use super::polls::PollResponse;
use crate::{
    extractors::AuthUser,
    form::read_form,
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Media attached to a choice.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaResponse {
    pub id: String,
    pub poll_choice_id: String,
    pub file_name: String,
    pub original_name: String,
    pub url: String,
    pub media_type: MediaType,
    pub mime_type: String,
    pub size: i64,
    pub display_order: i32,
    pub created_at: DateTime<FixedOffset>,
}

impl From<poll_choice_media::Model> for MediaResponse {
    fn from(m: poll_choice_media::Model) -> Self {
        Self {
            id: m.id,
            poll_choice_id: m.poll_choice_id,
            file_name: m.file_name,
            original_name: m.original_name,
            url: m.url,
            media_type: m.media_type,
            mime_type: m.mime_type,
            size: m.size,
            display_order: m.display_order,
            created_at: m.created_at,
        }
    }
}

/// Choice response with its media in display order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceResponse {
    pub id: String,
    pub poll_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    pub display_order: i32,
    /// Absent on responses that do not load media.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaResponse>>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl ChoiceResponse {
    fn new(c: poll_choice::Model, media: Option<Vec<poll_choice_media::Model>>) -> Self {
        Self {
            id: c.id,
            poll_id: c.poll_id,
            name: c.name,
            description: c.description,
            media_url: c.media_url,
            media_type: c.media_type,
            display_order: c.display_order,
            media: media.map(|m| m.into_iter().map(Into::into).collect()),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl From<ChoiceWithMedia> for ChoiceResponse {
    fn from(c: ChoiceWithMedia) -> Self {
        Self::new(c.choice, Some(c.media))
    }
}

/// A stored upload not yet attached to anything.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFileResponse {
    pub file_name: String,
    pub original_name: String,
    pub mime_type: String,
    pub media_type: MediaType,
    pub size: u64,
    pub url: String,
}

impl From<StoredFile> for StoredFileResponse {
    fn from(f: StoredFile) -> Self {
        Self {
            file_name: f.file_name,
            original_name: f.original_name,
            mime_type: f.mime_type,
            media_type: f.media_type,
            size: f.size,
            url: f.url,
        }
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

/// Add a choice. Accepts JSON, or multipart with `name`, `description` and files.
async fn add_choice(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Request,
) -> AppResult<ApiResponse<ChoiceResponse>> {
    let (input, files) = if is_multipart(&req) {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        let form = read_form(multipart).await?;
        let input = AddChoiceInput {
            name: form.text("name").unwrap_or_default(),
            description: form.text("description"),
        };
        (input, form.files)
    } else {
        let Json(input) = Json::<AddChoiceInput>::from_request(req, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        (input, Vec::new())
    };

    let choice = state
        .poll_choice_service
        .add_choice(&id, &user.id, input, files)
        .await?;
    Ok(ApiResponse::created(choice.into()))
}

async fn list_choices(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<ChoiceResponse>>> {
    let choices = state
        .poll_choice_service
        .list_choices(&id, &user.id)
        .await?;
    Ok(ApiResponse::ok(choices.into_iter().map(Into::into).collect()))
}

async fn update_choice(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((id, choice_id)): Path<(String, String)>,
    Json(req): Json<UpdateChoiceInput>,
) -> AppResult<ApiResponse<ChoiceResponse>> {
    let choice = state
        .poll_choice_service
        .update_choice(&id, &choice_id, &user.id, req)
        .await?;
    Ok(ApiResponse::ok(ChoiceResponse::new(choice, None)))
}

async fn delete_choice(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((id, choice_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .poll_choice_service
        .delete_choice(&id, &choice_id, &user.id)
        .await?;
    Ok(no_content())
}

/// Store one file without attaching it.
async fn upload_single(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<StoredFileResponse>> {
    let file = read_form(multipart).await?.into_single_file()?;
    let stored = state.media_service.upload(&user.id, file).await?;
    Ok(ApiResponse::created(stored.into()))
}

/// Store several files without attaching them.
async fn upload_multiple(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<Vec<StoredFileResponse>>> {
    let form = read_form(multipart).await?;
    if form.files.is_empty() {
        return Err(AppError::BadRequest("No files provided".to_string()));
    }

    let stored = state.media_service.upload_many(&user.id, form.files).await?;
    Ok(ApiResponse::created(
        stored.into_iter().map(Into::into).collect(),
    ))
}

async fn add_media(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(choice_id): Path<String>,
    multipart: Multipart,
) -> AppResult<ApiResponse<Vec<MediaResponse>>> {
    let form = read_form(multipart).await?;
    let media = state
        .poll_choice_service
        .add_media(&choice_id, &user.id, form.files)
        .await?;
    Ok(ApiResponse::created(
        media.into_iter().map(Into::into).collect(),
    ))
}

async fn delete_media(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(media_id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .poll_choice_service
        .delete_media(&media_id, &user.id)
        .await?;
    Ok(no_content())
}

async fn update_main_image(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<ApiResponse<PollResponse>> {
    let file = read_form(multipart).await?.into_single_file()?;
    let poll = state
        .poll_choice_service
        .update_main_image(&id, &user.id, file)
        .await?;
    Ok(ApiResponse::ok(PollResponse::new(poll, Utc::now())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/choices", post(add_choice).get(list_choices))
        .route(
            "/{id}/choices/{choice_id}",
            put(update_choice).delete(delete_choice),
        )
        .route("/{id}/main-image", put(update_main_image))
        .route("/upload/single", post(upload_single))
        .route("/upload/multiple", post(upload_multiple))
        .route("/choices/{choice_id}/media", post(add_media))
        .route("/media/{media_id}", delete(delete_media))
}
