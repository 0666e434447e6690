//! Poll choices and their media attachments.

use std::collections::HashMap;

use chrono::Utc;
use pollhub_common::{AppError, AppResult, IdGenerator};
use pollhub_db::{
    entities::{
        poll::{self, PollStatus},
        poll_choice, poll_choice_media,
    },
    repositories::{
        OrganizationMemberRepository, PollChoiceMediaRepository, PollChoiceRepository,
        PollRepository,
    },
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::media::{MediaService, StoredFile, UploadedFile};
use crate::services::poll::{ensure_visible, require_creator};

/// A choice with its media in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceWithMedia {
    pub choice: poll_choice::Model,
    pub media: Vec<poll_choice_media::Model>,
}

/// Input for adding a choice.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddChoiceInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

/// Input for updating a choice.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChoiceInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "super::double_option")]
    #[validate(length(max = 1000))]
    pub description: Option<Option<String>>,
}

/// Attach media rows to the choices they belong to, keeping choice order.
pub(crate) fn group_media(
    choices: Vec<poll_choice::Model>,
    media: Vec<poll_choice_media::Model>,
) -> Vec<ChoiceWithMedia> {
    let mut by_choice: HashMap<String, Vec<poll_choice_media::Model>> = HashMap::new();
    for item in media {
        by_choice
            .entry(item.poll_choice_id.clone())
            .or_default()
            .push(item);
    }

    choices
        .into_iter()
        .map(|choice| {
            let mut media = by_choice.remove(&choice.id).unwrap_or_default();
            media.sort_by_key(|m| m.display_order);
            ChoiceWithMedia { choice, media }
        })
        .collect()
}

/// Choice and media management for DRAFT polls.
#[derive(Clone)]
pub struct PollChoiceService {
    poll_repo: PollRepository,
    choice_repo: PollChoiceRepository,
    media_repo: PollChoiceMediaRepository,
    member_repo: OrganizationMemberRepository,
    media: MediaService,
    id_gen: IdGenerator,
}

impl PollChoiceService {
    #[must_use]
    pub fn new(
        poll_repo: PollRepository,
        choice_repo: PollChoiceRepository,
        media_repo: PollChoiceMediaRepository,
        member_repo: OrganizationMemberRepository,
        media: MediaService,
    ) -> Self {
        Self {
            poll_repo,
            choice_repo,
            media_repo,
            member_repo,
            media,
            id_gen: IdGenerator::new(),
        }
    }

    /// Append a choice, with optional files, to a DRAFT poll.
    ///
    /// Files are validated and written before the rows are inserted. If the
    /// insert fails the written files are removed again.
    pub async fn add_choice(
        &self,
        poll_id: &str,
        user_id: &str,
        input: AddChoiceInput,
        files: Vec<UploadedFile>,
    ) -> AppResult<ChoiceWithMedia> {
        input.validate()?;

        let poll = self.poll_repo.get_by_id(poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can add choices")?;
        if poll.status != PollStatus::Draft {
            return Err(AppError::PollNotDraft(
                "Cannot add choices to active or ended polls".to_string(),
            ));
        }

        let stored = self.media.upload_many(user_id, files).await?;
        let now = Utc::now();

        let choice = poll_choice::ActiveModel {
            id: Set(self.id_gen.generate()),
            poll_id: Set(poll_id.to_string()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            media_url: Set(None),
            media_type: Set(None),
            media_file_name: Set(None),
            display_order: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let media = stored.iter().map(|f| self.media_row(f)).collect();

        match self.choice_repo.append_with_media(poll_id, choice, media).await {
            Ok((choice, media)) => {
                tracing::info!(
                    poll_id = %poll_id,
                    choice_id = %choice.id,
                    media = media.len(),
                    "Choice added"
                );
                Ok(ChoiceWithMedia { choice, media })
            }
            Err(e) => {
                self.discard(&stored).await;
                Err(e)
            }
        }
    }

    /// Choices of a poll the viewer can see, in display order.
    pub async fn list_choices(
        &self,
        poll_id: &str,
        viewer_id: &str,
    ) -> AppResult<Vec<ChoiceWithMedia>> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        ensure_visible(&self.member_repo, &poll, viewer_id).await?;

        let choices = self.choice_repo.find_by_poll(poll_id).await?;
        let ids: Vec<String> = choices.iter().map(|c| c.id.clone()).collect();
        let media = self.media_repo.find_by_choices(&ids).await?;
        Ok(group_media(choices, media))
    }

    /// Rename or re-describe a choice of a DRAFT poll.
    pub async fn update_choice(
        &self,
        poll_id: &str,
        choice_id: &str,
        user_id: &str,
        input: UpdateChoiceInput,
    ) -> AppResult<poll_choice::Model> {
        input.validate()?;

        let choice = self.editable_choice(poll_id, choice_id, user_id).await?;

        let mut active: poll_choice::ActiveModel = choice.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        active.updated_at = Set(Utc::now().into());

        self.choice_repo.update(active).await
    }

    /// Remove a choice of a DRAFT poll and its files. Later choices move up.
    pub async fn delete_choice(
        &self,
        poll_id: &str,
        choice_id: &str,
        user_id: &str,
    ) -> AppResult<()> {
        let choice = self.editable_choice(poll_id, choice_id, user_id).await?;
        let media = self.media_repo.find_by_choice(choice_id).await?;

        self.choice_repo.delete_and_reorder(&choice).await?;

        let keys = media
            .iter()
            .map(|m| m.file_name.as_str())
            .chain(choice.media_file_name.as_deref())
            .collect::<Vec<&str>>();
        self.media.delete_all(keys).await;

        tracing::info!(poll_id = %poll_id, choice_id = %choice_id, "Choice deleted");
        Ok(())
    }

    /// Append files to a choice of a DRAFT poll.
    pub async fn add_media(
        &self,
        choice_id: &str,
        user_id: &str,
        files: Vec<UploadedFile>,
    ) -> AppResult<Vec<poll_choice_media::Model>> {
        if files.is_empty() {
            return Err(AppError::BadRequest("No files provided".to_string()));
        }

        let choice = self.choice_repo.get_by_id(choice_id).await?;
        let poll = self.poll_repo.get_by_id(&choice.poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can add media to choices")?;
        require_draft(&poll)?;

        let stored = self.media.upload_many(user_id, files).await?;
        let rows = stored.iter().map(|f| self.media_row(f)).collect();

        match self.media_repo.append(choice_id, rows).await {
            Ok(media) => Ok(media),
            Err(e) => {
                self.discard(&stored).await;
                Err(e)
            }
        }
    }

    /// Remove one media item from a choice of a DRAFT poll.
    pub async fn delete_media(&self, media_id: &str, user_id: &str) -> AppResult<()> {
        let media = self.media_repo.get_by_id(media_id).await?;
        let choice = self.choice_repo.get_by_id(&media.poll_choice_id).await?;
        let poll = self.poll_repo.get_by_id(&choice.poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can delete media")?;
        require_draft(&poll)?;

        self.media_repo.delete_and_reorder(&media).await?;
        self.media.delete(&media.file_name).await;
        Ok(())
    }

    /// Replace the poll's main image. Only `image/*` files are accepted.
    ///
    /// The previous image is removed once the new one is recorded.
    pub async fn update_main_image(
        &self,
        poll_id: &str,
        user_id: &str,
        file: UploadedFile,
    ) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can update the main image")?;

        if !file.content_type.to_ascii_lowercase().starts_with("image/") {
            return Err(AppError::Validation(
                "Only image files are allowed for main image".to_string(),
            ));
        }

        let stored = self.media.upload(user_id, file).await?;
        let previous = poll.main_image_key.clone();

        let mut active: poll::ActiveModel = poll.into();
        active.main_image_url = Set(Some(stored.url.clone()));
        active.main_image_key = Set(Some(stored.file_name.clone()));
        active.updated_at = Set(Utc::now().into());

        let poll = match self.poll_repo.update(active).await {
            Ok(poll) => poll,
            Err(e) => {
                self.media.delete(&stored.file_name).await;
                return Err(e);
            }
        };

        if let Some(key) = previous {
            self.media.delete(&key).await;
        }
        Ok(poll)
    }

    async fn editable_choice(
        &self,
        poll_id: &str,
        choice_id: &str,
        user_id: &str,
    ) -> AppResult<poll_choice::Model> {
        let choice = self.choice_repo.get_by_id(choice_id).await?;
        if choice.poll_id != poll_id {
            return Err(AppError::NotFound(format!("Choice not found: {choice_id}")));
        }

        let poll = self.poll_repo.get_by_id(poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can modify choices")?;
        require_draft(&poll)?;
        Ok(choice)
    }

    fn media_row(&self, file: &StoredFile) -> poll_choice_media::ActiveModel {
        let now = Utc::now();
        poll_choice_media::ActiveModel {
            id: Set(self.id_gen.generate()),
            poll_choice_id: Set(String::new()),
            file_name: Set(file.file_name.clone()),
            original_name: Set(file.original_name.clone()),
            url: Set(file.url.clone()),
            media_type: Set(file.media_type),
            mime_type: Set(file.mime_type.clone()),
            size: Set(i64::try_from(file.size).unwrap_or(i64::MAX)),
            display_order: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
    }

    async fn discard(&self, stored: &[StoredFile]) {
        let keys: Vec<&str> = stored.iter().map(|f| f.file_name.as_str()).collect();
        self.media.delete_all(keys).await;
    }
}

fn require_draft(poll: &poll::Model) -> AppResult<()> {
    if poll.status == PollStatus::Draft {
        Ok(())
    } else {
        Err(AppError::PollNotDraft(
            "Choices of active or ended polls cannot be modified".to_string(),
        ))
    }
}
