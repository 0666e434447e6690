//! Organization repository.

use std::sync::Arc;

use pollhub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, TransactionTrait,
};

use crate::entities::organization_member::MemberStatus;
use crate::entities::{Organization, OrganizationMember, organization, organization_member};

use super::map_write_err;

const DUPLICATE_NAME: &str = "Organization with this name already exists";

/// Repository for organization operations.
#[derive(Clone)]
pub struct OrganizationRepository {
    db: Arc<DatabaseConnection>,
}

impl OrganizationRepository {
    /// Create a new organization repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find organization by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<organization::Model>> {
        Organization::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get organization by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<organization::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::OrganizationNotFound(id.to_string()))
    }

    /// Find organization by exact name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<organization::Model>> {
        Organization::find()
            .filter(organization::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all organizations, newest first.
    pub async fn find_all(&self) -> AppResult<Vec<organization::Model>> {
        Organization::find()
            .order_by(organization::Column::CreatedAt, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Organizations where the user holds an ACCEPTED membership.
    pub async fn find_by_member(&self, user_id: &str) -> AppResult<Vec<organization::Model>> {
        let memberships = OrganizationMember::find()
            .filter(organization_member::Column::UserId.eq(user_id))
            .filter(organization_member::Column::Status.eq(MemberStatus::Accepted))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let ids: Vec<String> = memberships.into_iter().map(|m| m.organization_id).collect();
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Organization::find()
            .filter(organization::Column::Id.is_in(ids))
            .order_by(organization::Column::Name, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert an organization together with its owner membership.
    ///
    /// Both rows are written in one transaction.
    pub async fn create_with_owner(
        &self,
        org: organization::ActiveModel,
        owner: organization_member::ActiveModel,
    ) -> AppResult<(organization::Model, organization_member::Model)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let org = org
            .insert(&txn)
            .await
            .map_err(|e| map_write_err(&e, DUPLICATE_NAME))?;
        let owner = owner
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((org, owner))
    }

    /// Update an organization.
    pub async fn update(&self, model: organization::ActiveModel) -> AppResult<organization::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| map_write_err(&e, DUPLICATE_NAME))
    }

    /// Delete an organization. Memberships and polls cascade.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Organization::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
