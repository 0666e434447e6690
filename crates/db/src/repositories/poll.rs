//! Poll repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pollhub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, sea_query::Expr,
};

use crate::entities::poll::{PollStatus, PollType};
use crate::entities::{Poll, poll};

/// Repository for poll operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a poll by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PollNotFound(id.to_string()))
    }

    /// Public, enabled polls that have left DRAFT, newest first.
    pub async fn find_public(&self) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::PollType.eq(PollType::Public))
            .filter(poll::Column::IsActive.eq(true))
            .filter(poll::Column::Status.ne(PollStatus::Draft))
            .order_by(poll::Column::CreatedAt, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Polls created by a user, newest first.
    pub async fn find_by_creator(&self, user_id: &str) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::CreatedBy.eq(user_id))
            .order_by(poll::Column::CreatedAt, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Polls attached to an organization, newest first.
    pub async fn find_by_organization(&self, organization_id: &str) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(poll::Column::OrganizationId.eq(organization_id))
            .order_by(poll::Column::CreatedAt, Order::Desc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new poll.
    pub async fn create(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a poll.
    pub async fn update(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a poll. Choices, media rows and votes cascade in one statement.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Poll::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Store ENDED for ACTIVE polls whose deadline has passed.
    pub async fn end_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = now.into();
        let result = Poll::update_many()
            .col_expr(poll::Column::Status, Expr::value(PollStatus::Ended))
            .col_expr(poll::Column::UpdatedAt, Expr::value(now))
            .filter(poll::Column::Status.eq(PollStatus::Active))
            .filter(poll::Column::VotingEndsAt.lte(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
