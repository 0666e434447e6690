//! User service.

use std::borrow::Cow;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use pollhub_common::{AppError, AppResult, IdGenerator};
use pollhub_db::{entities::user, repositories::UserRepository};
use sea_orm::Set;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::services::auth_events::{self, AuthEventKind, AuthEventPublisherService};

/// Characters accepted as the "special" class in a password.
const PASSWORD_SPECIALS: &str = "@$!%*?&";

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    events: AuthEventPublisherService,
    id_gen: IdGenerator,
}

/// Input for registering a user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserInput {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(min = 1, max = 50))]
    pub first_name: String,

    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
}

/// Input for updating a profile. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
}

/// Input for changing a password.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,

    #[validate(
        length(min = 8, max = 128),
        custom(function = "validate_password_strength")
    )]
    pub new_password: String,
}

/// Upper, lower, digit and one of `@$!%*?&`, nothing outside those classes.
fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let is_special = |c: char| PASSWORD_SPECIALS.contains(c);
    let strong = password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(is_special)
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || is_special(c));

    if strong {
        Ok(())
    } else {
        Err(ValidationError::new("password_strength").with_message(Cow::Borrowed(
            "New password must contain at least one uppercase letter, one lowercase letter, \
             one number, and one special character (@$!%*?&)",
        )))
    }
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(user_repo: UserRepository, events: AuthEventPublisherService) -> Self {
        Self {
            user_repo,
            events,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user. Accounts start verified and active.
    pub async fn create(&self, input: CreateUserInput) -> AppResult<user::Model> {
        input.validate()?;

        let email = input.email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict(
                "User with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)?;
        let now = Utc::now();

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(email),
            password_hash: Set(password_hash),
            first_name: Set(input.first_name.trim().to_string()),
            last_name: Set(input.last_name.trim().to_string()),
            is_verified: Set(true),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Get a user by email.
    pub async fn get_by_email(&self, email: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_email(email.trim())
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.to_string()))
    }

    /// Update first and/or last name.
    pub async fn update_profile(
        &self,
        id: &str,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(id).await?;
        let mut active: user::ActiveModel = user.into();

        if let Some(first_name) = input.first_name {
            active.first_name = Set(first_name.trim().to_string());
        }
        if let Some(last_name) = input.last_name {
            active.last_name = Set(last_name.trim().to_string());
        }
        active.updated_at = Set(Utc::now().into());

        self.user_repo.update(active).await
    }

    /// Change a password after checking the current one.
    pub async fn change_password(&self, id: &str, input: ChangePasswordInput) -> AppResult<()> {
        input.validate()?;

        let user = self.user_repo.get_by_id(id).await?;
        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password(&input.new_password)?;
        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.updated_at = Set(Utc::now().into());
        self.user_repo.update(active).await?;

        auth_events::emit(&self.events, AuthEventKind::PasswordChanged, id).await;
        Ok(())
    }

    /// Mark a user as verified.
    pub async fn verify(&self, id: &str) -> AppResult<user::Model> {
        self.set_verified(id, true).await
    }

    /// Mark a user as unverified. Unverified users cannot log in.
    pub async fn unverify(&self, id: &str) -> AppResult<user::Model> {
        self.set_verified(id, false).await
    }

    async fn set_verified(&self, id: &str, verified: bool) -> AppResult<user::Model> {
        let user = self.user_repo.get_by_id(id).await?;
        let mut active: user::ActiveModel = user.into();
        active.is_verified = Set(verified);
        active.updated_at = Set(Utc::now().into());
        self.user_repo.update(active).await
    }
}

/// Hash a password with Argon2.
pub(crate) fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
pub(crate) fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::auth_events::testing::RecordingPublisher;
    use pollhub_db::test_utils::fixtures;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn service(db: MockDatabase) -> (UserService, Arc<RecordingPublisher>) {
        let recorder = Arc::new(RecordingPublisher::default());
        let repo = UserRepository::new(Arc::new(db.into_connection()));
        (UserService::new(repo, recorder.clone()), recorder)
    }

    fn user_with_password(password: &str) -> user::Model {
        let mut user = fixtures::user("u1", "alice@example.com");
        user.password_hash = hash_password(password).unwrap();
        user
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("Secret1!").unwrap();
        assert!(verify_password("Secret1!", &hash).unwrap());
        assert!(!verify_password("secret1!", &hash).unwrap());
    }

    fn update_values(db: Arc<sea_orm::DatabaseConnection>) -> Vec<sea_orm::Value> {
        let db = Arc::try_unwrap(db).ok().unwrap();
        db.into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements().to_vec())
            .filter(|stmt| stmt.sql.starts_with("UPDATE"))
            .flat_map(|stmt| stmt.values.map(|v| v.0).unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn test_unverify_clears_flag() {
        let user = fixtures::user("u1", "alice@example.com");
        let mut updated = user.clone();
        updated.is_verified = false;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .append_query_results([[updated]])
                .into_connection(),
        );
        let service = UserService::new(
            UserRepository::new(Arc::clone(&db)),
            Arc::new(RecordingPublisher::default()),
        );

        let user = service.unverify("u1").await.unwrap();
        assert!(!user.is_verified);

        drop(service);
        assert!(update_values(db).contains(&sea_orm::Value::Bool(Some(false))));
    }

    #[tokio::test]
    async fn test_verify_sets_flag() {
        let mut user = fixtures::user("u1", "alice@example.com");
        user.is_verified = false;
        let mut updated = user.clone();
        updated.is_verified = true;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .append_query_results([[updated]])
                .into_connection(),
        );
        let service = UserService::new(
            UserRepository::new(Arc::clone(&db)),
            Arc::new(RecordingPublisher::default()),
        );

        assert!(service.verify("u1").await.unwrap().is_verified);

        drop(service);
        assert!(update_values(db).contains(&sea_orm::Value::Bool(Some(true))));
    }

    #[tokio::test]
    async fn test_verify_missing_user() {
        let (service, _) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let result = service.verify("ghost").await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("Abcdef1!").is_ok());
        assert!(validate_password_strength("abcdef1!").is_err());
        assert!(validate_password_strength("ABCDEF1!").is_err());
        assert!(validate_password_strength("Abcdefg!").is_err());
        assert!(validate_password_strength("Abcdefg1").is_err());
        assert!(validate_password_strength("Abcdef1!#").is_err());
    }

    #[tokio::test]
    async fn test_create_user() {
        let created = fixtures::user("u1", "alice@example.com");
        let (service, _) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[created.clone()]]),
        );

        let user = service
            .create(CreateUserInput {
                email: "Alice@Example.com".to_string(),
                password: "password123".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Smith".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(user.email, "alice@example.com");
        assert!(user.is_verified);
    }

    #[tokio::test]
    async fn test_create_user_duplicate_email() {
        let existing = fixtures::user("u1", "alice@example.com");
        let (service, _) = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]),
        );

        let result = service
            .create(CreateUserInput {
                email: "alice@example.com".to_string(),
                password: "password123".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Smith".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_user_rejects_short_password() {
        let (service, _) = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .create(CreateUserInput {
                email: "alice@example.com".to_string(),
                password: "short".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Smith".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_change_password_wrong_current() {
        let (service, recorder) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user_with_password("OldPass1!")]]),
        );

        let result = service
            .change_password(
                "u1",
                ChangePasswordInput {
                    current_password: "nope".to_string(),
                    new_password: "NewPass1!".to_string(),
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(AppError::Validation(msg)) if msg == "Current password is incorrect"
        ));
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_change_password_emits_event() {
        let user = user_with_password("OldPass1!");
        let (service, recorder) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .append_query_results([[user]]),
        );

        service
            .change_password(
                "u1",
                ChangePasswordInput {
                    current_password: "OldPass1!".to_string(),
                    new_password: "NewPass1!".to_string(),
                },
            )
            .await
            .unwrap();

        let events = recorder.events.lock().unwrap();
        assert_eq!(events[0], (AuthEventKind::PasswordChanged, "u1".to_string()));
    }

    #[tokio::test]
    async fn test_update_profile_missing_user() {
        let (service, _) = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let result = service
            .update_profile(
                "missing",
                UpdateProfileInput {
                    first_name: Some("Bob".to_string()),
                    last_name: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }
}
