//! Refresh token repository.
//!
//! Keyed store with one entry per user: get, set, rotate, delete.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use pollhub_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
    sea_query::Expr,
};

use crate::entities::{RefreshToken, refresh_token};

/// Repository for persisted refresh tokens.
#[derive(Clone)]
pub struct RefreshTokenRepository {
    db: Arc<DatabaseConnection>,
}

impl RefreshTokenRepository {
    /// Create a new refresh token repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Store a token for a user, replacing any previous one.
    pub async fn set(
        &self,
        user_id: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let now = Utc::now();
        let model = refresh_token::ActiveModel {
            user_id: Set(user_id.to_string()),
            token_hash: Set(token_hash.to_string()),
            expires_at: Set(expires_at.into()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        RefreshToken::insert(model)
            .on_conflict(
                OnConflict::column(refresh_token::Column::UserId)
                    .update_columns([
                        refresh_token::Column::TokenHash,
                        refresh_token::Column::ExpiresAt,
                        refresh_token::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Replace `expected_hash` with `new_hash` in one statement.
    ///
    /// Returns `false` when the stored token no longer matches, so only one of
    /// several concurrent rotations with the same token can win.
    pub async fn rotate(
        &self,
        user_id: &str,
        expected_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let expires_at: sea_orm::prelude::DateTimeWithTimeZone = expires_at.into();

        let result = RefreshToken::update_many()
            .col_expr(refresh_token::Column::TokenHash, Expr::value(new_hash))
            .col_expr(refresh_token::Column::ExpiresAt, Expr::value(expires_at))
            .col_expr(refresh_token::Column::UpdatedAt, Expr::value(now))
            .filter(refresh_token::Column::UserId.eq(user_id))
            .filter(refresh_token::Column::TokenHash.eq(expected_hash))
            .filter(refresh_token::Column::ExpiresAt.gt(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    /// Delete the stored token. Deleting a missing token is not an error.
    pub async fn delete(&self, user_id: &str) -> AppResult<()> {
        RefreshToken::delete_by_id(user_id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_rotate_reports_lost_race() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );

        let repo = RefreshTokenRepository::new(db);
        let exp = Utc::now() + Duration::days(7);

        assert!(repo.rotate("u1", "old", "new", exp).await.unwrap());
        assert!(!repo.rotate("u1", "old", "newer", exp).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = RefreshTokenRepository::new(db);
        assert!(repo.delete("u1").await.is_ok());
    }
}
