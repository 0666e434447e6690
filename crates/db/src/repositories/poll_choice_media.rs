//! Poll choice media repository.

use std::sync::Arc;

use pollhub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, sea_query::Expr,
};

use crate::entities::{PollChoice, PollChoiceMedia, poll_choice_media};

/// Repository for media attached to poll choices.
#[derive(Clone)]
pub struct PollChoiceMediaRepository {
    db: Arc<DatabaseConnection>,
}

impl PollChoiceMediaRepository {
    /// Create a new media repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a media row by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll_choice_media::Model>> {
        PollChoiceMedia::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a media row by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll_choice_media::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media not found: {id}")))
    }

    /// Media of one choice in display order.
    pub async fn find_by_choice(
        &self,
        choice_id: &str,
    ) -> AppResult<Vec<poll_choice_media::Model>> {
        PollChoiceMedia::find()
            .filter(poll_choice_media::Column::PollChoiceId.eq(choice_id))
            .order_by(poll_choice_media::Column::DisplayOrder, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Media of several choices, ordered by choice then position.
    pub async fn find_by_choices(
        &self,
        choice_ids: &[String],
    ) -> AppResult<Vec<poll_choice_media::Model>> {
        if choice_ids.is_empty() {
            return Ok(vec![]);
        }

        PollChoiceMedia::find()
            .filter(poll_choice_media::Column::PollChoiceId.is_in(choice_ids.iter().cloned()))
            .order_by(poll_choice_media::Column::PollChoiceId, Order::Asc)
            .order_by(poll_choice_media::Column::DisplayOrder, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Append media rows after the choice's existing media.
    ///
    /// The parent choice row is locked while positions are assigned.
    pub async fn append(
        &self,
        choice_id: &str,
        media: Vec<poll_choice_media::ActiveModel>,
    ) -> AppResult<Vec<poll_choice_media::Model>> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        PollChoice::find_by_id(choice_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Choice not found: {choice_id}")))?;

        let existing = PollChoiceMedia::find()
            .filter(poll_choice_media::Column::PollChoiceId.eq(choice_id))
            .count(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut stored = Vec::with_capacity(media.len());
        for (offset, mut item) in media.into_iter().enumerate() {
            item.poll_choice_id = Set(choice_id.to_string());
            item.display_order = Set((existing as usize + offset) as i32);
            stored.push(
                item.insert(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?,
            );
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(stored)
    }

    /// Delete a media row and close the gap in its choice's ordering.
    pub async fn delete_and_reorder(&self, media: &poll_choice_media::Model) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        PollChoiceMedia::delete_by_id(&media.id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        PollChoiceMedia::update_many()
            .col_expr(
                poll_choice_media::Column::DisplayOrder,
                Expr::col(poll_choice_media::Column::DisplayOrder).sub(1),
            )
            .filter(poll_choice_media::Column::PollChoiceId.eq(&media.poll_choice_id))
            .filter(poll_choice_media::Column::DisplayOrder.gt(media.display_order))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
