//! Access core: login, token refresh, logout and token validation.

use chrono::{DateTime, Utc};
use pollhub_common::{AppError, AppResult};
use pollhub_db::{
    entities::user,
    repositories::{RefreshTokenRepository, UserRepository},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::services::auth_events::{self, AuthEventKind, AuthEventPublisherService};
use crate::services::token::{Claims, TokenCodec, TokenFailure, TokenKind, hash_token};
use crate::services::user::verify_password;

/// A freshly issued token pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: String,
    /// Expiry of the access token.
    pub expires_at: DateTime<Utc>,
}

/// Credentials for [`AuthService::login`].
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Body of a refresh request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenInput {
    #[validate(length(min = 1))]
    pub refresh_token: String,

    #[validate(length(min = 1))]
    pub user_id: String,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    token_repo: RefreshTokenRepository,
    codec: TokenCodec,
    events: AuthEventPublisherService,
}

impl AuthService {
    /// Create a new auth service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        token_repo: RefreshTokenRepository,
        codec: TokenCodec,
        events: AuthEventPublisherService,
    ) -> Self {
        Self {
            user_repo,
            token_repo,
            codec,
            events,
        }
    }

    /// Exchange credentials for a token pair.
    ///
    /// The stored refresh token is replaced, so an earlier session's refresh
    /// token stops working.
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthToken> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_email(input.email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&input.password, &user.password_hash)? || !user.is_active {
            return Err(AppError::InvalidCredentials);
        }
        if !user.is_verified {
            return Err(AppError::AccountNotVerified);
        }

        let (token, refresh_expires_at) = self.issue_pair(&user.id)?;
        self.token_repo
            .set(&user.id, &hash_token(&token.refresh_token), refresh_expires_at)
            .await?;

        auth_events::emit(&self.events, AuthEventKind::Login, &user.id).await;
        Ok(token)
    }

    /// Rotate a refresh token into a new pair.
    pub async fn refresh_token(&self, refresh_token: &str, user_id: &str) -> AppResult<AuthToken> {
        let claims = self
            .codec
            .decode(refresh_token, TokenKind::Refresh)
            .map_err(|_| AppError::InvalidRefreshToken)?;
        if claims.user_id != user_id {
            return Err(AppError::InvalidRefreshToken);
        }

        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidRefreshToken)?;
        if !user.is_verified {
            return Err(AppError::AccountNotVerified);
        }

        let (token, refresh_expires_at) = self.issue_pair(user_id)?;
        let rotated = self
            .token_repo
            .rotate(
                user_id,
                &hash_token(refresh_token),
                &hash_token(&token.refresh_token),
                refresh_expires_at,
            )
            .await?;

        if !rotated {
            tracing::debug!(user_id = %user_id, "Refresh token rejected: not the stored token");
            return Err(AppError::InvalidRefreshToken);
        }

        Ok(token)
    }

    /// Revoke the user's refresh token. Safe to call without one.
    pub async fn logout(&self, user_id: &str) -> AppResult<()> {
        self.token_repo.delete(user_id).await?;
        auth_events::emit(&self.events, AuthEventKind::Logout, user_id).await;
        Ok(())
    }

    /// Check an access token's signature, kind and expiry.
    pub fn validate_token(&self, token: &str) -> AppResult<Claims> {
        self.codec
            .decode(token, TokenKind::Access)
            .map_err(|failure| match failure {
                TokenFailure::Expired => {
                    AppError::InvalidToken("Access token has expired".to_string())
                }
                TokenFailure::Invalid => AppError::InvalidToken("Invalid token".to_string()),
            })
    }

    /// Resolve an access token to an active user.
    pub async fn authenticate(&self, token: &str) -> AppResult<user::Model> {
        let claims = self.validate_token(token)?;

        self.user_repo
            .find_by_id(&claims.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::Unauthorized)
    }

    fn issue_pair(&self, user_id: &str) -> AppResult<(AuthToken, DateTime<Utc>)> {
        let now = Utc::now();
        let access = self.codec.issue(user_id, TokenKind::Access, now)?;
        let refresh = self.codec.issue(user_id, TokenKind::Refresh, now)?;

        Ok((
            AuthToken {
                access_token: access.token,
                refresh_token: refresh.token,
                user_id: user_id.to_string(),
                expires_at: access.expires_at,
            },
            refresh.expires_at,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::auth_events::testing::RecordingPublisher;
    use crate::services::user::hash_password;
    use pollhub_db::test_utils::fixtures;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret", 900, 604_800)
    }

    fn service(db: MockDatabase) -> (AuthService, Arc<RecordingPublisher>) {
        let conn = Arc::new(db.into_connection());
        let recorder = Arc::new(RecordingPublisher::default());
        let service = AuthService::new(
            UserRepository::new(conn.clone()),
            RefreshTokenRepository::new(conn),
            codec(),
            recorder.clone(),
        );
        (service, recorder)
    }

    fn alice() -> user::Model {
        let mut user = fixtures::user("u1", "alice@example.com");
        user.password_hash = hash_password("password123").unwrap();
        user
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn login_input(password: &str) -> LoginInput {
        LoginInput {
            email: "alice@example.com".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let (service, recorder) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[alice()]])
                .append_exec_results([exec(1)]),
        );

        let token = service.login(login_input("password123")).await.unwrap();

        assert_eq!(token.user_id, "u1");
        let claims = service.validate_token(&token.access_token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(
            recorder.events.lock().unwrap().as_slice(),
            &[(AuthEventKind::Login, "u1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (service, recorder) =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[alice()]]));

        let result = service.login(login_input("wrong")).await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let (service, _) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let result = service.login(login_input("password123")).await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unverified() {
        let mut user = alice();
        user.is_verified = false;
        let (service, _) =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]));

        let result = service.login(login_input("password123")).await;
        assert!(matches!(result, Err(AppError::AccountNotVerified)));
    }

    #[tokio::test]
    async fn test_refresh_rotates() {
        let refresh = codec().issue("u1", TokenKind::Refresh, Utc::now()).unwrap();
        let (service, _) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[alice()]])
                .append_exec_results([exec(1)]),
        );

        let pair = service.refresh_token(&refresh.token, "u1").await.unwrap();
        assert_ne!(pair.refresh_token, refresh.token);
    }

    #[tokio::test]
    async fn test_refresh_with_replaced_token_fails() {
        let refresh = codec().issue("u1", TokenKind::Refresh, Utc::now()).unwrap();
        let (service, _) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[alice()]])
                .append_exec_results([exec(0)]),
        );

        let result = service.refresh_token(&refresh.token, "u1").await;
        assert!(matches!(result, Err(AppError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_refresh_for_other_user_fails() {
        let refresh = codec().issue("u1", TokenKind::Refresh, Utc::now()).unwrap();
        let (service, _) = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service.refresh_token(&refresh.token, "u2").await;
        assert!(matches!(result, Err(AppError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let access = codec().issue("u1", TokenKind::Access, Utc::now()).unwrap();
        let (service, _) = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service.refresh_token(&access.token, "u1").await;
        assert!(matches!(result, Err(AppError::InvalidRefreshToken)));
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (service, recorder) = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([exec(0)]),
        );

        service.logout("u1").await.unwrap();
        assert_eq!(
            recorder.events.lock().unwrap().as_slice(),
            &[(AuthEventKind::Logout, "u1".to_string())]
        );
    }

    #[test]
    fn test_validate_token_messages() {
        let (service, _) = service(MockDatabase::new(DatabaseBackend::Postgres));
        let expired = codec()
            .issue("u1", TokenKind::Access, Utc::now() - chrono::Duration::hours(2))
            .unwrap();

        assert!(matches!(
            service.validate_token(&expired.token),
            Err(AppError::InvalidToken(msg)) if msg == "Access token has expired"
        ));
        assert!(matches!(
            service.validate_token("garbage"),
            Err(AppError::InvalidToken(msg)) if msg == "Invalid token"
        ));
    }

    #[tokio::test]
    async fn test_authenticate_inactive_user() {
        let mut user = alice();
        user.is_active = false;
        let access = codec().issue("u1", TokenKind::Access, Utc::now()).unwrap();
        let (service, _) =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]));

        let result = service.authenticate(&access.token).await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }
}
