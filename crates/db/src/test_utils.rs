//! Test utilities for database-backed code.
//!
//! [`fixtures`] builds plain entity models for `MockDatabase` results. Enabled
//! for this crate's tests and for downstream crates through the `test-utils`
//! feature.

/// Entity model builders with sensible defaults.
pub mod fixtures {
    use chrono::{Duration, Utc};
    use sea_orm::prelude::DateTimeWithTimeZone;

    use crate::entities::organization::OrganizationType;
    use crate::entities::organization_member::{MemberRole, MemberStatus};
    use crate::entities::poll::{PollStatus, PollType, ResultDisplayType};
    use crate::entities::poll_choice::MediaType;
    use crate::entities::{
        organization, organization_member, poll, poll_choice, poll_choice_media, poll_vote, user,
    };

    fn now() -> DateTimeWithTimeZone {
        Utc::now().into()
    }

    /// A verified, active user.
    #[must_use]
    pub fn user(id: &str, email: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            is_verified: true,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    /// An active organization of type Group.
    #[must_use]
    pub fn organization(id: &str, name: &str) -> organization::Model {
        organization::Model {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            website: None,
            email: None,
            phone: None,
            organization_type: OrganizationType::Group,
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    /// An ACCEPTED membership with the given role.
    #[must_use]
    pub fn member(
        id: &str,
        organization_id: &str,
        user_id: &str,
        role: MemberRole,
    ) -> organization_member::Model {
        organization_member::Model {
            id: id.to_string(),
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            role,
            status: MemberStatus::Accepted,
            invited_by: None,
            invited_at: None,
            joined_at: Some(now()),
            expires_at: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    /// The ACCEPTED owner membership created alongside an organization.
    #[must_use]
    pub fn owner_membership(
        id: &str,
        organization_id: &str,
        user_id: &str,
    ) -> organization_member::Model {
        member(id, organization_id, user_id, MemberRole::Owner)
    }

    /// A PENDING MEMBER invite expiring in seven days.
    #[must_use]
    pub fn invite(
        id: &str,
        organization_id: &str,
        user_id: &str,
        invited_by: &str,
    ) -> organization_member::Model {
        organization_member::Model {
            id: id.to_string(),
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            role: MemberRole::Member,
            status: MemberStatus::Pending,
            invited_by: Some(invited_by.to_string()),
            invited_at: Some(now()),
            joined_at: None,
            expires_at: Some((Utc::now() + Duration::days(7)).into()),
            created_at: now(),
            updated_at: now(),
        }
    }

    /// A public DRAFT poll closing in one hour, single choice, closed results.
    #[must_use]
    pub fn poll(id: &str, created_by: &str) -> poll::Model {
        poll::Model {
            id: id.to_string(),
            title: "Lunch?".to_string(),
            description: None,
            created_by: created_by.to_string(),
            organization_id: None,
            poll_type: PollType::Public,
            result_display_type: ResultDisplayType::Closed,
            status: PollStatus::Draft,
            voting_ends_at: (Utc::now() + Duration::hours(1)).into(),
            allow_multiple_choices: false,
            is_active: true,
            main_image_url: None,
            main_image_key: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    /// A choice without inline media.
    #[must_use]
    pub fn choice(id: &str, poll_id: &str, display_order: i32) -> poll_choice::Model {
        poll_choice::Model {
            id: id.to_string(),
            poll_id: poll_id.to_string(),
            name: format!("Choice {display_order}"),
            description: None,
            media_url: None,
            media_type: None,
            media_file_name: None,
            display_order,
            created_at: now(),
            updated_at: now(),
        }
    }

    /// A PNG attached to a choice.
    #[must_use]
    pub fn media(id: &str, choice_id: &str, display_order: i32) -> poll_choice_media::Model {
        poll_choice_media::Model {
            id: id.to_string(),
            poll_choice_id: choice_id.to_string(),
            file_name: format!("2025/01/01/u1/{id}.png"),
            original_name: format!("{id}.png"),
            url: format!("http://localhost:3000/uploads/2025/01/01/u1/{id}.png"),
            media_type: MediaType::Image,
            mime_type: "image/png".to_string(),
            size: 1024,
            display_order,
            created_at: now(),
            updated_at: now(),
        }
    }

    /// A single vote.
    #[must_use]
    pub fn vote(id: &str, poll_id: &str, choice_id: &str, user_id: &str) -> poll_vote::Model {
        poll_vote::Model {
            id: id.to_string(),
            poll_id: poll_id.to_string(),
            choice_id: choice_id.to_string(),
            user_id: user_id.to_string(),
            voted_at: now(),
        }
    }
}
