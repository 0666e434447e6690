//! Poll entity.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Who can see and vote on a poll.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollType {
    #[default]
    #[sea_orm(string_value = "PUBLIC")]
    Public,
    /// Restricted to accepted members of the poll's organization.
    #[sea_orm(string_value = "PRIVATE")]
    Private,
}

/// When tallies are disclosed to non-creators.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultDisplayType {
    /// Visible while voting is open.
    #[sea_orm(string_value = "OPEN")]
    Open,
    /// Visible once voting has ended.
    #[default]
    #[sea_orm(string_value = "CLOSED")]
    Closed,
}

/// Lifecycle state: DRAFT -> ACTIVE -> ENDED | CANCELLED.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollStatus {
    #[default]
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "ENDED")]
    Ended,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl PollStatus {
    /// Whether `next` is a legal explicit transition from this state.
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Active) | (Self::Active, Self::Ended | Self::Cancelled)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    #[sea_orm(indexed)]
    pub created_by: String,

    /// Required when `poll_type` is PRIVATE.
    #[sea_orm(nullable, indexed)]
    pub organization_id: Option<String>,

    pub poll_type: PollType,

    pub result_display_type: ResultDisplayType,

    /// Stored status. ACTIVE polls past `voting_ends_at` read as ENDED.
    pub status: PollStatus,

    pub voting_ends_at: DateTimeWithTimeZone,

    #[sea_orm(default_value = false)]
    pub allow_multiple_choices: bool,

    #[sea_orm(default_value = true)]
    pub is_active: bool,

    #[sea_orm(nullable)]
    pub main_image_url: Option<String>,

    /// Storage key of the main image.
    #[sea_orm(nullable)]
    pub main_image_key: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Voting is open: ACTIVE and the deadline has not passed.
    pub fn is_voting_active(&self, now: DateTime<Utc>) -> bool {
        self.status == PollStatus::Active && now < self.voting_ends_at
    }

    /// Voting is over: ENDED, or the deadline has passed.
    pub fn is_voting_ended(&self, now: DateTime<Utc>) -> bool {
        self.status == PollStatus::Ended || now >= self.voting_ends_at
    }

    /// Status as observed at `now`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> PollStatus {
        if self.status == PollStatus::Active && now >= self.voting_ends_at {
            PollStatus::Ended
        } else {
            self.status
        }
    }

    /// Result visibility for `viewer_id`. The creator always sees results.
    pub fn can_view_results(&self, viewer_id: &str, now: DateTime<Utc>) -> bool {
        self.created_by == viewer_id
            || self.result_display_type == ResultDisplayType::Open
            || self.is_voting_ended(now)
    }

    pub fn is_private(&self) -> bool {
        self.poll_type == PollType::Private
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Creator,
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id",
        on_delete = "Cascade"
    )]
    Organization,
    #[sea_orm(has_many = "super::poll_choice::Entity")]
    PollChoice,
    #[sea_orm(has_many = "super::poll_vote::Entity")]
    PollVote,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::poll_choice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollChoice.def()
    }
}

impl Related<super::poll_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollVote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll(status: PollStatus, display: ResultDisplayType, ends_in: Duration) -> Model {
        let now = Utc::now();
        Model {
            id: "poll1".to_string(),
            title: "Lunch".to_string(),
            description: None,
            created_by: "creator".to_string(),
            organization_id: None,
            poll_type: PollType::Public,
            result_display_type: display,
            status,
            voting_ends_at: (now + ends_in).into(),
            allow_multiple_choices: false,
            is_active: true,
            main_image_url: None,
            main_image_key: None,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_voting_active_requires_active_status_and_future_deadline() {
        let now = Utc::now();
        let active = |status, ends_in| {
            poll(status, ResultDisplayType::Closed, ends_in).is_voting_active(now)
        };
        assert!(active(PollStatus::Active, Duration::hours(1)));
        assert!(!active(PollStatus::Draft, Duration::hours(1)));
        assert!(!active(PollStatus::Active, Duration::hours(-1)));
        assert!(!active(PollStatus::Cancelled, Duration::hours(1)));
    }

    #[test]
    fn test_deadline_passes_reads_as_ended() {
        let p = poll(PollStatus::Active, ResultDisplayType::Closed, Duration::minutes(5));
        let later = Utc::now() + Duration::minutes(10);

        assert_eq!(p.effective_status(Utc::now()), PollStatus::Active);
        assert_eq!(p.effective_status(later), PollStatus::Ended);
        assert!(p.is_voting_ended(later));
        assert!(!p.is_voting_active(later));
    }

    #[test]
    fn test_draft_is_never_reported_as_ended() {
        let p = poll(PollStatus::Draft, ResultDisplayType::Closed, Duration::hours(-1));
        assert_eq!(p.effective_status(Utc::now()), PollStatus::Draft);
    }

    #[test]
    fn test_result_visibility() {
        let now = Utc::now();
        let closed = poll(PollStatus::Active, ResultDisplayType::Closed, Duration::hours(1));
        assert!(closed.can_view_results("creator", now));
        assert!(!closed.can_view_results("someone", now));
        assert!(closed.can_view_results("someone", now + Duration::hours(2)));

        let open = poll(PollStatus::Active, ResultDisplayType::Open, Duration::hours(1));
        assert!(open.can_view_results("someone", now));

        let ended = poll(PollStatus::Ended, ResultDisplayType::Closed, Duration::hours(1));
        assert!(ended.can_view_results("someone", now));
    }

    #[test]
    fn test_status_transitions() {
        assert!(PollStatus::Draft.can_transition_to(PollStatus::Active));
        assert!(PollStatus::Active.can_transition_to(PollStatus::Ended));
        assert!(PollStatus::Active.can_transition_to(PollStatus::Cancelled));
        assert!(!PollStatus::Draft.can_transition_to(PollStatus::Ended));
        assert!(!PollStatus::Ended.can_transition_to(PollStatus::Active));
        assert!(!PollStatus::Cancelled.can_transition_to(PollStatus::Active));
    }
}
