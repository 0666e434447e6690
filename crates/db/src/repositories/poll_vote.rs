//! Poll vote repository.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use pollhub_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QuerySelect, TransactionTrait,
};

use super::map_write_err;
use crate::entities::{Poll, PollVote, poll_vote};

const DUPLICATE_VOTE: &str = "User has already voted for this choice";

/// Repository for poll votes.
#[derive(Clone)]
pub struct PollVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl PollVoteRepository {
    /// Create a new poll vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Votes a user has cast on a poll.
    pub async fn find_by_poll_and_user(
        &self,
        poll_id: &str,
        user_id: &str,
    ) -> AppResult<Vec<poll_vote::Model>> {
        PollVote::find()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Vote count per choice. Choices without votes are absent.
    pub async fn count_by_choice(&self, poll_id: &str) -> AppResult<Vec<(String, i64)>> {
        PollVote::find()
            .select_only()
            .column(poll_vote::Column::ChoiceId)
            .column_as(poll_vote::Column::Id.count(), "votes")
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .group_by(poll_vote::Column::ChoiceId)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of distinct users that voted on a poll.
    pub async fn count_voters(&self, poll_id: &str) -> AppResult<u64> {
        PollVote::find()
            .select_only()
            .column(poll_vote::Column::UserId)
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .distinct()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a user's votes for one poll.
    ///
    /// The poll row stays locked while its voting window and choice cap are
    /// re-read together with the user's existing votes, so a ballot cannot
    /// land on a poll that was ended or cancelled in the meantime and
    /// concurrent ballots from the same user serialize. A repeated choice or a
    /// second ballot on a single-choice poll is a `Conflict`.
    pub async fn insert_ballot(
        &self,
        poll_id: &str,
        user_id: &str,
        votes: Vec<poll_vote::ActiveModel>,
    ) -> AppResult<Vec<poll_vote::Model>> {
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

        if !poll.is_voting_active(Utc::now()) {
            return Err(AppError::BadRequest(
                "Voting is not open for this poll".to_string(),
            ));
        }

        let existing: HashSet<String> = PollVote::find()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .all(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .into_iter()
            .map(|v| v.choice_id)
            .collect();

        if !poll.allow_multiple_choices && (!existing.is_empty() || votes.len() > 1) {
            return Err(AppError::Conflict(
                "This poll accepts a single choice per user".to_string(),
            ));
        }

        let mut stored = Vec::with_capacity(votes.len());
        for vote in votes {
            if matches!(&vote.choice_id, ActiveValue::Set(id) if existing.contains(id)) {
                return Err(AppError::Conflict(DUPLICATE_VOTE.to_string()));
            }
            stored.push(
                vote.insert(&txn)
                    .await
                    .map_err(|e| map_write_err(&e, DUPLICATE_VOTE))?,
            );
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(stored)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::poll::{self, PollStatus};
    use crate::test_utils::fixtures;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase};

    fn open_poll(allow_multiple_choices: bool) -> poll::Model {
        let mut poll = fixtures::poll("p1", "creator");
        poll.status = PollStatus::Active;
        poll.allow_multiple_choices = allow_multiple_choices;
        poll
    }

    #[tokio::test]
    async fn test_insert_ballot() {
        let vote = fixtures::vote("v1", "p1", "c1", "u1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[open_poll(false)]])
                .append_query_results([Vec::<poll_vote::Model>::new()])
                .append_query_results([[vote.clone()]])
                .into_connection(),
        );

        let repo = PollVoteRepository::new(db);
        let stored = repo
            .insert_ballot("p1", "u1", vec![vote.into()])
            .await
            .unwrap();

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].choice_id, "c1");
    }

    #[tokio::test]
    async fn test_ballot_rejected_when_locked_poll_was_cancelled() {
        let mut poll = open_poll(false);
        poll.status = PollStatus::Cancelled;
        let vote = fixtures::vote("v1", "p1", "c1", "u1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll]])
                .into_connection(),
        );

        let repo = PollVoteRepository::new(db);
        let result = repo.insert_ballot("p1", "u1", vec![vote.into()]).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_ballot_rejected_after_deadline() {
        let mut poll = open_poll(true);
        poll.voting_ends_at = (Utc::now() - chrono::Duration::minutes(1)).into();
        let vote = fixtures::vote("v1", "p1", "c1", "u1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[poll]])
                .into_connection(),
        );

        let repo = PollVoteRepository::new(db);
        let result = repo.insert_ballot("p1", "u1", vec![vote.into()]).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_cap_comes_from_locked_row() {
        let first = fixtures::vote("v1", "p1", "c1", "u1");
        let second = fixtures::vote("v2", "p1", "c2", "u1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[open_poll(false)]])
                .append_query_results([Vec::<poll_vote::Model>::new()])
                .into_connection(),
        );

        let repo = PollVoteRepository::new(db);
        let result = repo
            .insert_ballot("p1", "u1", vec![first.into(), second.into()])
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_second_ballot_on_single_choice_poll() {
        let previous = fixtures::vote("v1", "p1", "c1", "u1");
        let next = fixtures::vote("v2", "p1", "c2", "u1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[open_poll(false)]])
                .append_query_results([[previous]])
                .into_connection(),
        );

        let repo = PollVoteRepository::new(db);
        let result = repo.insert_ballot("p1", "u1", vec![next.into()]).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_repeat_choice_on_multi_choice_poll() {
        let previous = fixtures::vote("v1", "p1", "c1", "u1");
        let again = fixtures::vote("v2", "p1", "c1", "u1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[open_poll(true)]])
                .append_query_results([[previous]])
                .into_connection(),
        );

        let repo = PollVoteRepository::new(db);
        let result = repo.insert_ballot("p1", "u1", vec![again.into()]).await;
        assert!(matches!(result, Err(AppError::Conflict(msg)) if msg == DUPLICATE_VOTE));
    }

    #[tokio::test]
    async fn test_other_write_failures_stay_database_errors() {
        let vote = fixtures::vote("v1", "p1", "c1", "u1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[open_poll(true)]])
                .append_query_results([Vec::<poll_vote::Model>::new()])
                .append_query_errors([DbErr::Custom("connection reset".to_string())])
                .into_connection(),
        );

        let repo = PollVoteRepository::new(db);
        let result = repo.insert_ballot("p1", "u1", vec![vote.into()]).await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
