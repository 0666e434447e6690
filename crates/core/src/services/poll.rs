//! Poll service: lifecycle, visibility, voting and results.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use pollhub_common::{AppError, AppResult, IdGenerator};
use pollhub_db::{
    entities::{
        poll::{self, PollStatus, PollType, ResultDisplayType},
        poll_choice, poll_vote,
    },
    repositories::{
        OrganizationMemberRepository, OrganizationRepository, PollChoiceMediaRepository,
        PollChoiceRepository, PollRepository, PollVoteRepository,
    },
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::media::MediaService;
use crate::services::poll_choice::{ChoiceWithMedia, group_media};

/// Input for creating a poll.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 1000))]
    pub description: Option<String>,

    pub voting_ends_at: DateTime<Utc>,

    #[serde(default, rename = "type")]
    pub poll_type: PollType,

    #[serde(default)]
    pub result_display_type: ResultDisplayType,

    pub organization_id: Option<String>,

    #[serde(default)]
    pub allow_multiple_choices: bool,
}

/// Input for updating a DRAFT poll.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePollInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "super::double_option")]
    #[validate(length(max = 1000))]
    pub description: Option<Option<String>>,

    pub voting_ends_at: Option<DateTime<Utc>>,

    pub result_display_type: Option<ResultDisplayType>,

    pub allow_multiple_choices: Option<bool>,
}

/// A ballot: one or more choices of the same poll.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteInput {
    #[validate(length(min = 1, max = 100))]
    pub choice_ids: Vec<String>,
}

/// Vote count of one choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceResult {
    pub choice_id: String,
    pub name: String,
    pub votes: i64,
}

/// Tallies of a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResults {
    pub poll_id: String,
    pub total_votes: i64,
    pub total_voters: u64,
    pub choices: Vec<ChoiceResult>,
}

/// Everything a viewer sees on a poll page.
#[derive(Debug, Clone)]
pub struct PollDetail {
    pub poll: poll::Model,
    pub effective_status: PollStatus,
    pub is_voting_active: bool,
    pub is_voting_ended: bool,
    pub can_view_results: bool,
    pub choices: Vec<ChoiceWithMedia>,
    /// Choice ids the viewer voted for.
    pub my_votes: Vec<String>,
    /// Present only when `can_view_results`.
    pub results: Option<PollResults>,
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    choice_repo: PollChoiceRepository,
    media_repo: PollChoiceMediaRepository,
    vote_repo: PollVoteRepository,
    org_repo: OrganizationRepository,
    member_repo: OrganizationMemberRepository,
    media: MediaService,
    id_gen: IdGenerator,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub fn new(
        poll_repo: PollRepository,
        choice_repo: PollChoiceRepository,
        media_repo: PollChoiceMediaRepository,
        vote_repo: PollVoteRepository,
        org_repo: OrganizationRepository,
        member_repo: OrganizationMemberRepository,
        media: MediaService,
    ) -> Self {
        Self {
            poll_repo,
            choice_repo,
            media_repo,
            vote_repo,
            org_repo,
            member_repo,
            media,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a DRAFT poll. Choices are added separately.
    pub async fn create(&self, creator_id: &str, input: CreatePollInput) -> AppResult<poll::Model> {
        input.validate()?;

        let organization_id = input
            .organization_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        if input.poll_type == PollType::Private && organization_id.is_none() {
            return Err(AppError::Validation(
                "Organization ID is required for private polls".to_string(),
            ));
        }

        let now = Utc::now();
        if input.voting_ends_at <= now {
            return Err(AppError::Validation(
                "Voting end time must be in the future".to_string(),
            ));
        }

        if let Some(org_id) = &organization_id {
            self.org_repo.get_by_id(org_id).await?;
            if self.member_repo.find_accepted(org_id, creator_id).await?.is_none() {
                return Err(AppError::Forbidden(
                    "You must be a member of the organization to create polls for it".to_string(),
                ));
            }
        }

        let model = poll::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title.trim().to_string()),
            description: Set(input.description),
            created_by: Set(creator_id.to_string()),
            organization_id: Set(organization_id),
            poll_type: Set(input.poll_type),
            result_display_type: Set(input.result_display_type),
            status: Set(PollStatus::Draft),
            voting_ends_at: Set(input.voting_ends_at.into()),
            allow_multiple_choices: Set(input.allow_multiple_choices),
            is_active: Set(true),
            main_image_url: Set(None),
            main_image_key: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let poll = self.poll_repo.create(model).await?;
        tracing::info!(poll_id = %poll.id, created_by = %creator_id, "Poll created");
        Ok(poll)
    }

    /// Open a DRAFT poll for voting.
    pub async fn activate(&self, poll_id: &str, user_id: &str) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can activate the poll")?;

        if poll.status != PollStatus::Draft {
            return Err(AppError::PollNotDraft(
                "Only draft polls can be activated".to_string(),
            ));
        }
        if poll.voting_ends_at <= Utc::now() {
            return Err(AppError::Validation(
                "Cannot activate poll with past voting end time".to_string(),
            ));
        }

        self.set_status(poll, PollStatus::Active).await
    }

    /// Close voting on an ACTIVE poll ahead of its deadline.
    pub async fn end(&self, poll_id: &str, user_id: &str) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can end the poll")?;

        if !poll.status.can_transition_to(PollStatus::Ended) {
            return Err(AppError::BadRequest(
                "Only active polls can be ended".to_string(),
            ));
        }
        self.set_status(poll, PollStatus::Ended).await
    }

    /// Abandon an ACTIVE poll.
    pub async fn cancel(&self, poll_id: &str, user_id: &str) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can cancel the poll")?;

        if !poll.status.can_transition_to(PollStatus::Cancelled) {
            return Err(AppError::BadRequest(
                "Only active polls can be cancelled".to_string(),
            ));
        }
        self.set_status(poll, PollStatus::Cancelled).await
    }

    /// Update a DRAFT poll.
    pub async fn update(
        &self,
        poll_id: &str,
        user_id: &str,
        input: UpdatePollInput,
    ) -> AppResult<poll::Model> {
        input.validate()?;

        let poll = self.poll_repo.get_by_id(poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can update the poll")?;

        if poll.status != PollStatus::Draft {
            return Err(AppError::PollNotDraft(
                "Only draft polls can be updated".to_string(),
            ));
        }
        if input.voting_ends_at.is_some_and(|at| at <= Utc::now()) {
            return Err(AppError::Validation(
                "Voting end time must be in the future".to_string(),
            ));
        }

        let mut active: poll::ActiveModel = poll.into();
        if let Some(title) = input.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(voting_ends_at) = input.voting_ends_at {
            active.voting_ends_at = Set(voting_ends_at.into());
        }
        if let Some(result_display_type) = input.result_display_type {
            active.result_display_type = Set(result_display_type);
        }
        if let Some(allow_multiple_choices) = input.allow_multiple_choices {
            active.allow_multiple_choices = Set(allow_multiple_choices);
        }
        active.updated_at = Set(Utc::now().into());

        self.poll_repo.update(active).await
    }

    /// Delete a poll and, best effort, every file it references.
    ///
    /// Choices, media rows and votes go with the poll row. File removal runs
    /// after the row is gone and never fails the call.
    pub async fn delete(&self, poll_id: &str, user_id: &str) -> AppResult<()> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        require_creator(&poll, user_id, "Only poll creator can delete the poll")?;

        let choices = self.choice_repo.find_by_poll(poll_id).await?;
        let choice_ids: Vec<String> = choices.iter().map(|c| c.id.clone()).collect();
        let media = self.media_repo.find_by_choices(&choice_ids).await?;

        let mut keys: Vec<String> = media.into_iter().map(|m| m.file_name).collect();
        keys.extend(choices.into_iter().filter_map(|c| c.media_file_name));
        keys.extend(poll.main_image_key);

        self.poll_repo.delete(poll_id).await?;
        self.media.delete_all(keys.iter().map(String::as_str)).await;

        tracing::info!(poll_id = %poll_id, files = keys.len(), "Poll deleted");
        Ok(())
    }

    /// Get a poll the viewer is allowed to see.
    pub async fn get(&self, poll_id: &str, viewer_id: &str) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        self.ensure_visible(&poll, viewer_id).await?;
        Ok(poll)
    }

    /// Poll with choices, the viewer's votes and, when visible, tallies.
    pub async fn get_detail(&self, poll_id: &str, viewer_id: &str) -> AppResult<PollDetail> {
        let poll = self.get(poll_id, viewer_id).await?;
        let now = Utc::now();

        let choices = self.choice_repo.find_by_poll(poll_id).await?;
        let choice_ids: Vec<String> = choices.iter().map(|c| c.id.clone()).collect();
        let media = self.media_repo.find_by_choices(&choice_ids).await?;

        let my_votes = self
            .vote_repo
            .find_by_poll_and_user(poll_id, viewer_id)
            .await?
            .into_iter()
            .map(|v| v.choice_id)
            .collect();

        let can_view_results = poll.can_view_results(viewer_id, now);
        let results = if can_view_results {
            Some(self.tally(&poll.id, &choices).await?)
        } else {
            None
        };

        Ok(PollDetail {
            effective_status: poll.effective_status(now),
            is_voting_active: poll.is_voting_active(now),
            is_voting_ended: poll.is_voting_ended(now),
            can_view_results,
            choices: group_media(choices, media),
            my_votes,
            results,
            poll,
        })
    }

    /// Public polls that have been opened, newest first.
    pub async fn list_public(&self) -> AppResult<Vec<poll::Model>> {
        self.poll_repo.find_public().await
    }

    /// Polls created by `user_id`.
    pub async fn list_mine(&self, user_id: &str) -> AppResult<Vec<poll::Model>> {
        self.poll_repo.find_by_creator(user_id).await
    }

    /// Polls of an organization. The actor must be an accepted member.
    pub async fn list_for_organization(
        &self,
        organization_id: &str,
        actor_id: &str,
    ) -> AppResult<Vec<poll::Model>> {
        self.org_repo.get_by_id(organization_id).await?;
        if self
            .member_repo
            .find_accepted(organization_id, actor_id)
            .await?
            .is_none()
        {
            return Err(AppError::Forbidden(
                "You are not a member of this organization".to_string(),
            ));
        }

        let polls = self.poll_repo.find_by_organization(organization_id).await?;
        Ok(polls
            .into_iter()
            .filter(|p| p.status != PollStatus::Draft || p.created_by == actor_id)
            .collect())
    }

    /// Cast a ballot.
    pub async fn vote(
        &self,
        poll_id: &str,
        user_id: &str,
        input: CastVoteInput,
    ) -> AppResult<Vec<poll_vote::Model>> {
        input.validate()?;

        let poll = self.get(poll_id, user_id).await?;
        let now = Utc::now();
        if !poll.is_voting_active(now) {
            return Err(AppError::BadRequest(
                "Voting is not open for this poll".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let choice_ids: Vec<String> = input
            .choice_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if !poll.allow_multiple_choices && choice_ids.len() > 1 {
            return Err(AppError::Validation(
                "This poll accepts a single choice per user".to_string(),
            ));
        }

        let known: HashSet<String> = self
            .choice_repo
            .find_by_poll(poll_id)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        if let Some(unknown) = choice_ids.iter().find(|id| !known.contains(*id)) {
            return Err(AppError::NotFound(format!("Choice not found: {unknown}")));
        }

        let votes = choice_ids
            .into_iter()
            .map(|choice_id| poll_vote::ActiveModel {
                id: Set(self.id_gen.generate()),
                poll_id: Set(poll_id.to_string()),
                choice_id: Set(choice_id),
                user_id: Set(user_id.to_string()),
                voted_at: Set(now.into()),
            })
            .collect();

        let stored = self
            .vote_repo
            .insert_ballot(poll_id, user_id, votes)
            .await?;

        tracing::info!(poll_id = %poll_id, user_id = %user_id, count = stored.len(), "Vote cast");
        Ok(stored)
    }

    /// Tallies, when `viewer_id` may see them.
    pub async fn results(&self, poll_id: &str, viewer_id: &str) -> AppResult<PollResults> {
        let poll = self.get(poll_id, viewer_id).await?;
        if !poll.can_view_results(viewer_id, Utc::now()) {
            return Err(AppError::Forbidden(
                "Results are not available until voting ends".to_string(),
            ));
        }

        let choices = self.choice_repo.find_by_poll(poll_id).await?;
        self.tally(poll_id, &choices).await
    }

    /// Whether `user_id` may see the tallies of a poll. Missing polls yield `false`.
    pub async fn can_user_view_results(&self, poll_id: &str, user_id: &str) -> AppResult<bool> {
        let Some(poll) = self.poll_repo.find_by_id(poll_id).await? else {
            return Ok(false);
        };
        Ok(self.can_view(&poll, user_id).await? && poll.can_view_results(user_id, Utc::now()))
    }

    /// Store ENDED for ACTIVE polls whose deadline has passed.
    pub async fn end_expired_polls(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.poll_repo.end_expired(now).await
    }

    async fn set_status(&self, poll: poll::Model, status: PollStatus) -> AppResult<poll::Model> {
        let poll_id = poll.id.clone();
        let mut active: poll::ActiveModel = poll.into();
        active.status = Set(status);
        active.updated_at = Set(Utc::now().into());

        let poll = self.poll_repo.update(active).await?;
        tracing::info!(poll_id = %poll_id, status = ?status, "Poll status changed");
        Ok(poll)
    }

    async fn tally(
        &self,
        poll_id: &str,
        choices: &[poll_choice::Model],
    ) -> AppResult<PollResults> {
        let counts: HashMap<String, i64> = self
            .vote_repo
            .count_by_choice(poll_id)
            .await?
            .into_iter()
            .collect();
        let total_voters = self.vote_repo.count_voters(poll_id).await?;

        let choices: Vec<ChoiceResult> = choices
            .iter()
            .map(|c| ChoiceResult {
                choice_id: c.id.clone(),
                name: c.name.clone(),
                votes: counts.get(&c.id).copied().unwrap_or(0),
            })
            .collect();

        Ok(PollResults {
            poll_id: poll_id.to_string(),
            total_votes: choices.iter().map(|c| c.votes).sum(),
            total_voters,
            choices,
        })
    }

    async fn can_view(&self, poll: &poll::Model, viewer_id: &str) -> AppResult<bool> {
        can_view_poll(&self.member_repo, poll, viewer_id).await
    }

    async fn ensure_visible(&self, poll: &poll::Model, viewer_id: &str) -> AppResult<()> {
        ensure_visible(&self.member_repo, poll, viewer_id).await
    }
}

/// Fail with `Forbidden(message)` unless `user_id` created the poll.
pub(crate) fn require_creator(poll: &poll::Model, user_id: &str, message: &str) -> AppResult<()> {
    if poll.created_by == user_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(message.to_string()))
    }
}

/// Drafts are visible to their creator only; private polls to the creator
/// and ACCEPTED members of the poll's organization.
pub(crate) async fn can_view_poll(
    member_repo: &OrganizationMemberRepository,
    poll: &poll::Model,
    viewer_id: &str,
) -> AppResult<bool> {
    if poll.created_by == viewer_id {
        return Ok(true);
    }
    if poll.status == PollStatus::Draft {
        return Ok(false);
    }
    if !poll.is_private() {
        return Ok(true);
    }
    match &poll.organization_id {
        Some(org_id) => Ok(member_repo.find_accepted(org_id, viewer_id).await?.is_some()),
        None => Ok(false),
    }
}

/// Like [`can_view_poll`], as an error. Hidden drafts read as missing.
pub(crate) async fn ensure_visible(
    member_repo: &OrganizationMemberRepository,
    poll: &poll::Model,
    viewer_id: &str,
) -> AppResult<()> {
    if can_view_poll(member_repo, poll, viewer_id).await? {
        return Ok(());
    }
    if poll.status == PollStatus::Draft {
        Err(AppError::PollNotFound(poll.id.clone()))
    } else {
        Err(AppError::Forbidden(
            "This poll is restricted to organization members".to_string(),
        ))
    }
}
