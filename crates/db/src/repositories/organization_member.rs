//! Organization member repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pollhub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, sea_query::Expr,
};

use crate::entities::organization_member::MemberStatus;
use crate::entities::{OrganizationMember, organization_member};

use super::map_write_err;

/// Repository for memberships and invites.
#[derive(Clone)]
pub struct OrganizationMemberRepository {
    db: Arc<DatabaseConnection>,
}

impl OrganizationMemberRepository {
    /// Create a new member repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a membership row by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<organization_member::Model>> {
        OrganizationMember::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the membership row for a user in an organization, whatever its status.
    pub async fn find_by_organization_and_user(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> AppResult<Option<organization_member::Model>> {
        OrganizationMember::find()
            .filter(organization_member::Column::OrganizationId.eq(organization_id))
            .filter(organization_member::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the ACCEPTED membership for a user in an organization.
    pub async fn find_accepted(
        &self,
        organization_id: &str,
        user_id: &str,
    ) -> AppResult<Option<organization_member::Model>> {
        Ok(self
            .find_by_organization_and_user(organization_id, user_id)
            .await?
            .filter(|m| m.status == MemberStatus::Accepted))
    }

    /// All membership rows of an organization, newest first.
    pub async fn find_by_organization(
        &self,
        organization_id: &str,
    ) -> AppResult<Vec<organization_member::Model>> {
        OrganizationMember::find()
            .filter(organization_member::Column::OrganizationId.eq(organization_id))
            .order_by(organization_member::Column::CreatedAt, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// PENDING invites addressed to a user.
    pub async fn find_pending_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<organization_member::Model>> {
        OrganizationMember::find()
            .filter(organization_member::Column::UserId.eq(user_id))
            .filter(organization_member::Column::Status.eq(MemberStatus::Pending))
            .order_by(organization_member::Column::InvitedAt, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a membership row.
    pub async fn create(
        &self,
        model: organization_member::ActiveModel,
    ) -> AppResult<organization_member::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            map_write_err(&e, "User already has a membership in this organization")
        })
    }

    /// Update a membership row.
    pub async fn update(
        &self,
        model: organization_member::ActiveModel,
    ) -> AppResult<organization_member::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a membership row.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        OrganizationMember::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Mark PENDING invites whose expiry has passed as EXPIRED.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = now.into();
        let result = OrganizationMember::update_many()
            .col_expr(
                organization_member::Column::Status,
                Expr::value(MemberStatus::Expired),
            )
            .col_expr(organization_member::Column::UpdatedAt, Expr::value(now))
            .filter(organization_member::Column::Status.eq(MemberStatus::Pending))
            .filter(organization_member::Column::ExpiresAt.lte(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
