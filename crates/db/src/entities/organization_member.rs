//! Organization member entity.
//!
//! A row binds one user to one organization. The same row carries the invite
//! workflow: it starts PENDING and moves to ACCEPTED, DECLINED or EXPIRED.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a member within an organization.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    /// Regular member.
    #[default]
    #[sea_orm(string_value = "MEMBER")]
    Member,
    /// Can manage members and settings.
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    /// Creator of the organization. Exactly one per organization.
    #[sea_orm(string_value = "OWNER")]
    Owner,
}

impl MemberRole {
    /// Check if the role can invite and remove members.
    pub const fn can_manage_members(&self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }

    /// Check if the role can edit organization settings.
    pub const fn can_manage_settings(&self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }

    /// Only owners may change roles.
    pub const fn can_change_roles(&self) -> bool {
        self.is_owner()
    }

    /// Check if this is the owner role.
    pub const fn is_owner(&self) -> bool {
        matches!(self, Self::Owner)
    }
}

/// Membership / invite status.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    #[default]
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    #[sea_orm(string_value = "DECLINED")]
    Declined,
    #[sea_orm(string_value = "EXPIRED")]
    Expired,
}

impl MemberStatus {
    /// Statuses that block a fresh invite for the same user.
    pub const fn is_current(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organization_member")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub organization_id: String,

    #[sea_orm(indexed)]
    pub user_id: String,

    pub role: MemberRole,

    pub status: MemberStatus,

    /// Who sent the invite. Empty for the owner row.
    #[sea_orm(nullable)]
    pub invited_by: Option<String>,

    #[sea_orm(nullable)]
    pub invited_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub joined_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Whether a pending invite is past its expiry at `now`.
    pub fn is_invite_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organization::Entity",
        from = "Column::OrganizationId",
        to = "super::organization::Column::Id",
        on_delete = "Cascade"
    )]
    Organization,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::organization::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organization.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
