//! Poll choice repository.

use std::sync::Arc;

use pollhub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::Expr,
};

use crate::entities::{Poll, PollChoice, poll::PollStatus, poll_choice, poll_choice_media};

/// Repository for poll choices.
#[derive(Clone)]
pub struct PollChoiceRepository {
    db: Arc<DatabaseConnection>,
}

impl PollChoiceRepository {
    /// Create a new poll choice repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a choice by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<poll_choice::Model>> {
        PollChoice::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a choice by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<poll_choice::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Choice not found: {id}")))
    }

    /// Choices of a poll in display order.
    pub async fn find_by_poll(&self, poll_id: &str) -> AppResult<Vec<poll_choice::Model>> {
        PollChoice::find()
            .filter(poll_choice::Column::PollId.eq(poll_id))
            .order_by(poll_choice::Column::DisplayOrder, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Append a choice and its media rows to a poll.
    ///
    /// The poll row is locked so the appended choice takes the next free
    /// position even under concurrent adds, and so a poll activated in the
    /// meantime is not extended. Ownership and ordering fields on the given
    /// models are overwritten.
    pub async fn append_with_media(
        &self,
        poll_id: &str,
        mut choice: poll_choice::ActiveModel,
        media: Vec<poll_choice_media::ActiveModel>,
    ) -> AppResult<(poll_choice::Model, Vec<poll_choice_media::Model>)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let poll = Poll::find_by_id(poll_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::PollNotFound(poll_id.to_string()))?;

        if poll.status != PollStatus::Draft {
            return Err(AppError::PollNotDraft(
                "Cannot add choices to active or ended polls".to_string(),
            ));
        }

        let position = PollChoice::find()
            .filter(poll_choice::Column::PollId.eq(poll_id))
            .count(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        choice.poll_id = Set(poll_id.to_string());
        choice.display_order = Set(position as i32);
        let choice = choice
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut stored = Vec::with_capacity(media.len());
        for (index, mut item) in media.into_iter().enumerate() {
            item.poll_choice_id = Set(choice.id.clone());
            item.display_order = Set(index as i32);
            stored.push(
                item.insert(&txn)
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?,
            );
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((choice, stored))
    }

    /// Update a choice.
    pub async fn update(&self, model: poll_choice::ActiveModel) -> AppResult<poll_choice::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a choice and close the gap it leaves in the ordering.
    pub async fn delete_and_reorder(&self, choice: &poll_choice::Model) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        PollChoice::delete_by_id(&choice.id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        shift_down_after(&txn, &choice.poll_id, choice.display_order).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

async fn shift_down_after<C: ConnectionTrait>(
    conn: &C,
    poll_id: &str,
    removed_order: i32,
) -> AppResult<()> {
    PollChoice::update_many()
        .col_expr(
            poll_choice::Column::DisplayOrder,
            Expr::col(poll_choice::Column::DisplayOrder).sub(1),
        )
        .filter(poll_choice::Column::PollId.eq(poll_id))
        .filter(poll_choice::Column::DisplayOrder.gt(removed_order))
        .exec(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};

    #[tokio::test]
    async fn test_append_takes_next_position() {
        let poll = fixtures::poll("p1", "creator");
        let mut stored_choice = fixtures::choice("c3", "p1", 2);
        stored_choice.name = "Third".to_string();
        let stored_media = fixtures::media("md1", "c3", 0);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll]])
                .append_query_results([[btreemap! {
                    "num_items" => Into::<Value>::into(2i64),
                }]])
                .append_query_results([[stored_choice.clone()]])
                .append_query_results([[stored_media.clone()]])
                .into_connection(),
        );

        let repo = PollChoiceRepository::new(db);
        let choice: poll_choice::ActiveModel = stored_choice.clone().into();
        let media: poll_choice_media::ActiveModel = stored_media.clone().into();

        let (choice, media) = repo
            .append_with_media("p1", choice, vec![media])
            .await
            .unwrap();

        assert_eq!(choice.display_order, 2);
        assert_eq!(media.len(), 1);
        assert_eq!(media[0].poll_choice_id, "c3");
    }

    #[tokio::test]
    async fn test_append_rejected_when_locked_poll_is_active() {
        let mut poll = fixtures::poll("p1", "creator");
        poll.status = PollStatus::Active;
        let choice = fixtures::choice("c1", "p1", 0);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll]])
                .into_connection(),
        );

        let repo = PollChoiceRepository::new(db);
        let result = repo.append_with_media("p1", choice.into(), vec![]).await;
        assert!(matches!(result, Err(AppError::PollNotDraft(_))));
    }

    #[tokio::test]
    async fn test_delete_and_reorder() {
        let choice = fixtures::choice("c1", "p1", 0);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 2,
                    },
                ])
                .into_connection(),
        );

        let repo = PollChoiceRepository::new(db);
        assert!(repo.delete_and_reorder(&choice).await.is_ok());
    }
}
