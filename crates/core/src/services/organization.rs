//! Organization service: organizations, membership and invites.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pollhub_common::{AppError, AppResult, IdGenerator};
use pollhub_db::{
    entities::{
        organization::{self, OrganizationType},
        organization_member::{self, MemberRole, MemberStatus},
    },
    repositories::{OrganizationMemberRepository, OrganizationRepository, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::organization_validator::OrganizationValidator;

/// Input for creating an organization.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    #[validate(length(max = 255))]
    pub website: Option<String>,

    #[validate(length(max = 255))]
    pub email: Option<String>,

    #[validate(length(max = 20))]
    pub phone: Option<String>,

    pub organization_type: Option<OrganizationType>,
}

/// Input for updating an organization. `null` clears an optional field.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "super::double_option")]
    #[validate(length(max = 500))]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "super::double_option")]
    #[validate(length(max = 255))]
    pub website: Option<Option<String>>,

    #[serde(default, deserialize_with = "super::double_option")]
    #[validate(length(max = 255))]
    pub email: Option<Option<String>>,

    #[serde(default, deserialize_with = "super::double_option")]
    #[validate(length(max = 20))]
    pub phone: Option<Option<String>>,

    pub organization_type: Option<OrganizationType>,

    pub is_active: Option<bool>,
}

/// Input for inviting a user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteUserInput {
    #[validate(length(min = 1))]
    pub user_id: String,

    #[serde(default)]
    pub role: MemberRole,
}

/// Organization service for business logic.
#[derive(Clone)]
pub struct OrganizationService {
    org_repo: OrganizationRepository,
    member_repo: OrganizationMemberRepository,
    user_repo: UserRepository,
    validator: Arc<dyn OrganizationValidator>,
    invite_ttl: Duration,
    id_gen: IdGenerator,
}

impl OrganizationService {
    /// Create a new organization service.
    #[must_use]
    pub fn new(
        org_repo: OrganizationRepository,
        member_repo: OrganizationMemberRepository,
        user_repo: UserRepository,
        validator: Arc<dyn OrganizationValidator>,
        invite_ttl_days: i64,
    ) -> Self {
        Self {
            org_repo,
            member_repo,
            user_repo,
            validator,
            invite_ttl: Duration::days(invite_ttl_days),
            id_gen: IdGenerator::new(),
        }
    }

    /// Create an organization owned by `owner_id`.
    pub async fn create(
        &self,
        owner_id: &str,
        input: CreateOrganizationInput,
    ) -> AppResult<organization::Model> {
        input.validate()?;

        let name = input.name.trim().to_string();
        if self.org_repo.find_by_name(&name).await?.is_some() {
            return Err(AppError::Conflict(
                "Organization with this name already exists".to_string(),
            ));
        }

        let email = non_empty(input.email);
        let website = non_empty(input.website);
        let phone = non_empty(input.phone);
        self.check_contacts(email.as_deref(), website.as_deref(), phone.as_deref())?;

        let now = Utc::now();
        let org_id = self.id_gen.generate();

        let org = organization::ActiveModel {
            id: Set(org_id.clone()),
            name: Set(name),
            description: Set(input.description),
            website: Set(website),
            email: Set(email),
            phone: Set(phone),
            organization_type: Set(input.organization_type.unwrap_or_default()),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let owner = organization_member::ActiveModel {
            id: Set(self.id_gen.generate()),
            organization_id: Set(org_id),
            user_id: Set(owner_id.to_string()),
            role: Set(MemberRole::Owner),
            status: Set(MemberStatus::Accepted),
            invited_by: Set(None),
            invited_at: Set(None),
            joined_at: Set(Some(now.into())),
            expires_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let (org, _) = self.org_repo.create_with_owner(org, owner).await?;
        tracing::info!(organization_id = %org.id, owner_id = %owner_id, "Organization created");
        Ok(org)
    }

    /// Get an organization by ID.
    pub async fn get(&self, id: &str) -> AppResult<organization::Model> {
        self.org_repo.get_by_id(id).await
    }

    /// List every organization.
    pub async fn list(&self) -> AppResult<Vec<organization::Model>> {
        self.org_repo.find_all().await
    }

    /// Organizations the user has joined.
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<organization::Model>> {
        self.org_repo.find_by_member(user_id).await
    }

    /// Update an organization. Requires OWNER or ADMIN.
    pub async fn update(
        &self,
        id: &str,
        actor_id: &str,
        input: UpdateOrganizationInput,
    ) -> AppResult<organization::Model> {
        input.validate()?;

        let org = self.org_repo.get_by_id(id).await?;
        self.require_role(
            id,
            actor_id,
            MemberRole::can_manage_settings,
            "Insufficient permissions to update organization",
        )
        .await?;

        let mut active: organization::ActiveModel = org.clone().into();

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name != org.name {
                if let Some(existing) = self.org_repo.find_by_name(&name).await? {
                    if existing.id != org.id {
                        return Err(AppError::Conflict(
                            "Organization with this name already exists".to_string(),
                        ));
                    }
                }
                active.name = Set(name);
            }
        }

        let email = input.email.map(non_empty);
        let website = input.website.map(non_empty);
        let phone = input.phone.map(non_empty);
        self.check_contacts(
            email.as_ref().and_then(Option::as_deref),
            website.as_ref().and_then(Option::as_deref),
            phone.as_ref().and_then(Option::as_deref),
        )?;

        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(email) = email {
            active.email = Set(email);
        }
        if let Some(website) = website {
            active.website = Set(website);
        }
        if let Some(phone) = phone {
            active.phone = Set(phone);
        }
        if let Some(organization_type) = input.organization_type {
            active.organization_type = Set(organization_type);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now().into());

        self.org_repo.update(active).await
    }

    /// Delete an organization. Requires OWNER.
    pub async fn delete(&self, id: &str, actor_id: &str) -> AppResult<()> {
        self.org_repo.get_by_id(id).await?;
        self.require_role(
            id,
            actor_id,
            MemberRole::is_owner,
            "Only organization owners can delete the organization",
        )
        .await?;

        self.org_repo.delete(id).await?;
        tracing::info!(organization_id = %id, "Organization deleted");
        Ok(())
    }

    /// Enable an organization. Requires OWNER or ADMIN.
    pub async fn activate(&self, id: &str, actor_id: &str) -> AppResult<organization::Model> {
        self.set_active(id, actor_id, true).await
    }

    /// Disable an organization. Requires OWNER or ADMIN.
    pub async fn deactivate(&self, id: &str, actor_id: &str) -> AppResult<organization::Model> {
        self.set_active(id, actor_id, false).await
    }

    async fn set_active(
        &self,
        id: &str,
        actor_id: &str,
        is_active: bool,
    ) -> AppResult<organization::Model> {
        self.update(
            id,
            actor_id,
            UpdateOrganizationInput {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
        .await
    }

    /// Membership rows of an organization. The actor must be a member.
    pub async fn get_members(
        &self,
        organization_id: &str,
        actor_id: &str,
    ) -> AppResult<Vec<organization_member::Model>> {
        self.org_repo.get_by_id(organization_id).await?;
        self.require_role(
            organization_id,
            actor_id,
            |_| true,
            "You are not a member of this organization",
        )
        .await?;
        self.member_repo.find_by_organization(organization_id).await
    }

    /// Invite a user. The inviter must hold OWNER or ADMIN.
    ///
    /// A DECLINED, EXPIRED or lapsed PENDING row for the same user is reset to
    /// a fresh PENDING invite instead of inserting a second row.
    pub async fn invite_user(
        &self,
        organization_id: &str,
        invited_by: &str,
        input: InviteUserInput,
    ) -> AppResult<organization_member::Model> {
        input.validate()?;
        if input.role.is_owner() {
            return Err(AppError::Validation(
                "Cannot invite a user as organization owner".to_string(),
            ));
        }

        self.org_repo.get_by_id(organization_id).await?;
        self.require_role(
            organization_id,
            invited_by,
            MemberRole::can_manage_members,
            "Insufficient permissions to invite members",
        )
        .await?;
        self.user_repo.get_by_id(&input.user_id).await?;

        let now = Utc::now();
        let expires_at = now + self.invite_ttl;

        let existing = self
            .member_repo
            .find_by_organization_and_user(organization_id, &input.user_id)
            .await?;

        let invite = match existing {
            Some(member) if member.status == MemberStatus::Accepted => {
                return Err(AppError::Conflict(
                    "User is already a member of this organization".to_string(),
                ));
            }
            Some(member)
                if member.status == MemberStatus::Pending && !member.is_invite_expired(now) =>
            {
                return Err(AppError::Conflict(
                    "User already has a pending invite to this organization".to_string(),
                ));
            }
            Some(member) => {
                let mut active: organization_member::ActiveModel = member.into();
                active.role = Set(input.role);
                active.status = Set(MemberStatus::Pending);
                active.invited_by = Set(Some(invited_by.to_string()));
                active.invited_at = Set(Some(now.into()));
                active.joined_at = Set(None);
                active.expires_at = Set(Some(expires_at.into()));
                active.updated_at = Set(now.into());
                self.member_repo.update(active).await?
            }
            None => {
                let model = organization_member::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    organization_id: Set(organization_id.to_string()),
                    user_id: Set(input.user_id.clone()),
                    role: Set(input.role),
                    status: Set(MemberStatus::Pending),
                    invited_by: Set(Some(invited_by.to_string())),
                    invited_at: Set(Some(now.into())),
                    joined_at: Set(None),
                    expires_at: Set(Some(expires_at.into())),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                self.member_repo.create(model).await?
            }
        };

        tracing::info!(
            organization_id = %organization_id,
            user_id = %invite.user_id,
            invited_by = %invited_by,
            "User invited to organization"
        );
        Ok(invite)
    }

    /// Accept an invite addressed to `user_id`.
    pub async fn accept_invite(
        &self,
        invite_id: &str,
        user_id: &str,
    ) -> AppResult<organization_member::Model> {
        let invite = self.get_own_pending_invite(invite_id, user_id).await?;
        let now = Utc::now();

        if invite.is_invite_expired(now) {
            let mut active: organization_member::ActiveModel = invite.into();
            active.status = Set(MemberStatus::Expired);
            active.updated_at = Set(now.into());
            self.member_repo.update(active).await?;
            return Err(AppError::InviteExpired);
        }

        let mut active: organization_member::ActiveModel = invite.into();
        active.status = Set(MemberStatus::Accepted);
        active.joined_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        self.member_repo.update(active).await
    }

    /// Decline an invite addressed to `user_id`.
    pub async fn decline_invite(
        &self,
        invite_id: &str,
        user_id: &str,
    ) -> AppResult<organization_member::Model> {
        let invite = self.get_own_pending_invite(invite_id, user_id).await?;

        let mut active: organization_member::ActiveModel = invite.into();
        active.status = Set(MemberStatus::Declined);
        active.updated_at = Set(Utc::now().into());
        self.member_repo.update(active).await
    }

    /// PENDING invites for a user that have not lapsed.
    pub async fn list_pending_invites(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<organization_member::Model>> {
        let now = Utc::now();
        Ok(self
            .member_repo
            .find_pending_by_user(user_id)
            .await?
            .into_iter()
            .filter(|invite| !invite.is_invite_expired(now))
            .collect())
    }

    /// Remove a member or revoke an invite. Requires OWNER or ADMIN.
    pub async fn remove_member(
        &self,
        organization_id: &str,
        user_id: &str,
        removed_by: &str,
    ) -> AppResult<()> {
        let target = self
            .member_repo
            .find_by_organization_and_user(organization_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        if target.role.is_owner() {
            return Err(AppError::Forbidden(
                "Cannot remove the organization owner".to_string(),
            ));
        }

        self.require_role(
            organization_id,
            removed_by,
            MemberRole::can_manage_members,
            "Insufficient permissions to remove member",
        )
        .await?;

        self.member_repo.delete(&target.id).await?;
        tracing::info!(
            organization_id = %organization_id,
            user_id = %user_id,
            removed_by = %removed_by,
            "Member removed"
        );
        Ok(())
    }

    /// Change a member's role. Requires OWNER; ownership is not transferable here.
    pub async fn update_member_role(
        &self,
        organization_id: &str,
        user_id: &str,
        role: MemberRole,
        updated_by: &str,
    ) -> AppResult<organization_member::Model> {
        let target = self
            .member_repo
            .find_by_organization_and_user(organization_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Member not found".to_string()))?;

        if target.role.is_owner() && role != MemberRole::Owner {
            return Err(AppError::Forbidden(
                "Cannot change the role of the organization owner".to_string(),
            ));
        }

        self.require_role(
            organization_id,
            updated_by,
            MemberRole::can_change_roles,
            "Only organization owners can update member roles",
        )
        .await?;

        if role.is_owner() && !target.role.is_owner() {
            return Err(AppError::Validation(
                "Ownership cannot be assigned through a role change".to_string(),
            ));
        }

        let mut active: organization_member::ActiveModel = target.into();
        active.role = Set(role);
        active.updated_at = Set(Utc::now().into());
        self.member_repo.update(active).await
    }

    /// Mark lapsed PENDING invites as EXPIRED.
    pub async fn expire_stale_invites(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.member_repo.expire_stale(now).await
    }

    async fn get_own_pending_invite(
        &self,
        invite_id: &str,
        user_id: &str,
    ) -> AppResult<organization_member::Model> {
        let invite = self
            .member_repo
            .find_by_id(invite_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invite not found".to_string()))?;

        if invite.user_id != user_id {
            return Err(AppError::Unauthorized);
        }
        if invite.status != MemberStatus::Pending {
            return Err(AppError::InviteNotPending);
        }
        Ok(invite)
    }

    /// The actor's ACCEPTED membership, provided its role passes `allowed`.
    ///
    /// Only a missing or insufficient membership becomes `Forbidden(denied)`;
    /// lookup failures propagate unchanged.
    async fn require_role(
        &self,
        organization_id: &str,
        user_id: &str,
        allowed: impl Fn(&MemberRole) -> bool,
        denied: &str,
    ) -> AppResult<organization_member::Model> {
        self.member_repo
            .find_accepted(organization_id, user_id)
            .await?
            .filter(|m| allowed(&m.role))
            .ok_or_else(|| AppError::Forbidden(denied.to_string()))
    }

    fn check_contacts(
        &self,
        email: Option<&str>,
        website: Option<&str>,
        phone: Option<&str>,
    ) -> AppResult<()> {
        if email.is_some_and(|e| !self.validator.validate_email(e)) {
            return Err(AppError::Validation("Invalid email format".to_string()));
        }
        if website.is_some_and(|w| !self.validator.validate_website(w)) {
            return Err(AppError::Validation("Invalid website format".to_string()));
        }
        if phone.is_some_and(|p| !self.validator.validate_phone(p)) {
            return Err(AppError::Validation("Invalid phone format".to_string()));
        }
        Ok(())
    }
}

/// Treat blank optional strings as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::organization_validator::DefaultOrganizationValidator;
    use pollhub_db::entities::{organization, user};
    use pollhub_db::test_utils::fixtures;
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult, Value};

    fn service(db: MockDatabase) -> OrganizationService {
        service_on(Arc::new(db.into_connection()))
    }

    fn service_on(conn: Arc<DatabaseConnection>) -> OrganizationService {
        OrganizationService::new(
            OrganizationRepository::new(conn.clone()),
            OrganizationMemberRepository::new(conn.clone()),
            UserRepository::new(conn),
            Arc::new(DefaultOrganizationValidator),
            7,
        )
    }

    fn create_input(name: &str) -> CreateOrganizationInput {
        CreateOrganizationInput {
            name: name.to_string(),
            description: None,
            website: Some("example.com".to_string()),
            email: Some("team@example.com".to_string()),
            phone: None,
            organization_type: None,
        }
    }

    fn no_members() -> Vec<organization_member::Model> {
        vec![]
    }

    #[tokio::test]
    async fn test_create_organization() {
        let org = fixtures::organization("org1", "Acme");
        let owner = fixtures::owner_membership("m1", "org1", "u1");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<organization::Model>::new()])
                .append_query_results([[org.clone()]])
                .append_query_results([[owner]]),
        );

        let created = service.create("u1", create_input("Acme")).await.unwrap();
        assert_eq!(created.id, "org1");
    }

    /// Statements of the single transaction opened by `create_with_owner`.
    fn transaction_statements(conn: Arc<DatabaseConnection>) -> Vec<sea_orm::Statement> {
        let conn = Arc::try_unwrap(conn).unwrap();
        conn.into_transaction_log()
            .into_iter()
            .flat_map(|txn| txn.statements().to_vec())
            .collect()
    }

    #[tokio::test]
    async fn test_create_inserts_accepted_owner_membership() {
        let conn = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<organization::Model>::new()])
                .append_query_results([[fixtures::organization("org1", "Acme")]])
                .append_query_results([[fixtures::owner_membership("m1", "org1", "u1")]])
                .into_connection(),
        );
        service_on(conn.clone())
            .create("u1", create_input("Acme"))
            .await
            .unwrap();

        let statements = transaction_statements(conn);
        let owner_insert = statements
            .iter()
            .find(|stmt| stmt.sql.starts_with(r#"INSERT INTO "organization_member""#))
            .unwrap();
        let values = owner_insert.values.as_ref().unwrap().0.clone();
        assert!(values.contains(&Value::from("OWNER")));
        assert!(values.contains(&Value::from("ACCEPTED")));
        assert!(values.contains(&Value::from("u1")));
        // joined_at, created_at and updated_at are set; invited_at and expires_at are not.
        let timestamps = values
            .iter()
            .filter(|v| matches!(v, Value::ChronoDateTimeWithTimeZone(Some(_))))
            .count();
        assert_eq!(timestamps, 3);
        assert_eq!(statements.last().map(|s| s.sql.as_str()), Some("COMMIT"));
    }

    #[tokio::test]
    async fn test_create_rolls_back_when_owner_insert_fails() {
        let conn = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<organization::Model>::new()])
                .append_query_results([[fixtures::organization("org1", "Acme")]])
                .append_query_errors([DbErr::Custom("owner insert failed".to_string())])
                .into_connection(),
        );
        let result = service_on(conn.clone())
            .create("u1", create_input("Acme"))
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));

        let statements = transaction_statements(conn);
        assert!(statements.iter().any(|s| s.sql.starts_with(r#"INSERT INTO "organization""#)));
        assert!(statements.iter().all(|s| s.sql != "COMMIT"));
        assert_eq!(statements.last().map(|s| s.sql.as_str()), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_create_duplicate_name() {
        let existing = fixtures::organization("org1", "Acme");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]),
        );

        let result = service.create("u1", create_input("Acme")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_invalid_email() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<organization::Model>::new()]),
        );

        let mut input = create_input("Acme");
        input.email = Some("not-an-email".to_string());

        let result = service.create("u1", input).await;
        assert!(matches!(result, Err(AppError::Validation(msg)) if msg == "Invalid email format"));
    }

    #[tokio::test]
    async fn test_update_requires_admin() {
        let org = fixtures::organization("org1", "Acme");
        let member = fixtures::member("m2", "org1", "u2", MemberRole::Member);
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[org]])
                .append_query_results([[member]]),
        );

        let result = service
            .update(
                "org1",
                "u2",
                UpdateOrganizationInput {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_propagates_membership_lookup_failure() {
        let org = fixtures::organization("org1", "Acme");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[org]])
                .append_query_errors([DbErr::Custom("connection reset".to_string())]),
        );

        let result = service
            .update(
                "org1",
                "u1",
                UpdateOrganizationInput {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_invite_user() {
        let org = fixtures::organization("org1", "Acme");
        let owner = fixtures::owner_membership("m1", "org1", "u1");
        let invitee = fixtures::user("u2", "bob@example.com");
        let invite = fixtures::invite("m2", "org1", "u2", "u1");

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[org]])
                .append_query_results([[owner]])
                .append_query_results([[invitee]])
                .append_query_results([no_members()])
                .append_query_results([[invite]]),
        );

        let invite = service
            .invite_user(
                "org1",
                "u1",
                InviteUserInput {
                    user_id: "u2".to_string(),
                    role: MemberRole::Member,
                },
            )
            .await
            .unwrap();

        assert_eq!(invite.status, MemberStatus::Pending);
        assert!(invite.expires_at.is_some());
    }

    #[tokio::test]
    async fn test_invite_existing_member() {
        let org = fixtures::organization("org1", "Acme");
        let owner = fixtures::owner_membership("m1", "org1", "u1");
        let invitee = fixtures::user("u2", "bob@example.com");
        let member = fixtures::member("m2", "org1", "u2", MemberRole::Member);

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[org]])
                .append_query_results([[owner]])
                .append_query_results([[invitee]])
                .append_query_results([[member]]),
        );

        let result = service
            .invite_user(
                "org1",
                "u1",
                InviteUserInput {
                    user_id: "u2".to_string(),
                    role: MemberRole::Member,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(AppError::Conflict(msg)) if msg == "User is already a member of this organization"
        ));
    }

    #[tokio::test]
    async fn test_invite_pending_twice() {
        let org = fixtures::organization("org1", "Acme");
        let owner = fixtures::owner_membership("m1", "org1", "u1");
        let invitee = fixtures::user("u2", "bob@example.com");
        let pending = fixtures::invite("m2", "org1", "u2", "u1");

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[org]])
                .append_query_results([[owner]])
                .append_query_results([[invitee]])
                .append_query_results([[pending]]),
        );

        let result = service
            .invite_user(
                "org1",
                "u1",
                InviteUserInput {
                    user_id: "u2".to_string(),
                    role: MemberRole::Admin,
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(AppError::Conflict(msg))
                if msg == "User already has a pending invite to this organization"
        ));
    }

    #[tokio::test]
    async fn test_invite_as_owner_rejected() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));
        let result = service
            .invite_user(
                "org1",
                "u1",
                InviteUserInput {
                    user_id: "u2".to_string(),
                    role: MemberRole::Owner,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_invite_missing_organization() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<organization::Model>::new()]),
        );

        let result = service
            .invite_user(
                "missing",
                "u1",
                InviteUserInput {
                    user_id: "u2".to_string(),
                    role: MemberRole::Member,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::OrganizationNotFound(_))));
    }

    #[tokio::test]
    async fn test_invite_unknown_user() {
        let org = fixtures::organization("org1", "Acme");
        let owner = fixtures::owner_membership("m1", "org1", "u1");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[org]])
                .append_query_results([[owner]])
                .append_query_results([Vec::<user::Model>::new()]),
        );

        let result = service
            .invite_user(
                "org1",
                "u1",
                InviteUserInput {
                    user_id: "ghost".to_string(),
                    role: MemberRole::Member,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_accept_invite() {
        let invite = fixtures::invite("m2", "org1", "u2", "u1");
        let mut accepted = invite.clone();
        accepted.status = MemberStatus::Accepted;

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[invite]])
                .append_query_results([[accepted]]),
        );

        let member = service.accept_invite("m2", "u2").await.unwrap();
        assert_eq!(member.status, MemberStatus::Accepted);
    }

    #[tokio::test]
    async fn test_accept_expired_invite() {
        let mut invite = fixtures::invite("m2", "org1", "u2", "u1");
        invite.expires_at = Some((Utc::now() - Duration::hours(1)).into());
        let mut expired = invite.clone();
        expired.status = MemberStatus::Expired;

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[invite]])
                .append_query_results([[expired]]),
        );

        let result = service.accept_invite("m2", "u2").await;
        assert!(matches!(result, Err(AppError::InviteExpired)));
    }

    #[tokio::test]
    async fn test_accept_someone_elses_invite() {
        let invite = fixtures::invite("m2", "org1", "u2", "u1");
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[invite]]));

        let result = service.accept_invite("m2", "u3").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_decline_someone_elses_invite() {
        let invite = fixtures::invite("m2", "org1", "u2", "u1");
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[invite]]));

        let result = service.decline_invite("m2", "u3").await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_accept_twice_is_not_pending() {
        let mut invite = fixtures::invite("m2", "org1", "u2", "u1");
        invite.status = MemberStatus::Accepted;
        invite.joined_at = Some(Utc::now().into());
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[invite]]));

        let result = service.accept_invite("m2", "u2").await;
        assert!(matches!(result, Err(AppError::InviteNotPending)));
    }

    #[tokio::test]
    async fn test_decline_non_pending() {
        let mut invite = fixtures::invite("m2", "org1", "u2", "u1");
        invite.status = MemberStatus::Declined;
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[invite]]));

        let result = service.decline_invite("m2", "u2").await;
        assert!(matches!(result, Err(AppError::InviteNotPending)));
    }

    #[tokio::test]
    async fn test_remove_owner_rejected() {
        let owner = fixtures::owner_membership("m1", "org1", "u1");
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[owner]]));

        let result = service.remove_member("org1", "u1", "u1").await;
        assert!(matches!(
            result,
            Err(AppError::Forbidden(msg)) if msg == "Cannot remove the organization owner"
        ));
    }

    #[tokio::test]
    async fn test_remove_member_by_admin() {
        let target = fixtures::member("m3", "org1", "u3", MemberRole::Member);
        let admin = fixtures::member("m2", "org1", "u2", MemberRole::Admin);
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[target]])
                .append_query_results([[admin]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }]),
        );

        service.remove_member("org1", "u3", "u2").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_member_without_permission() {
        let target = fixtures::member("m3", "org1", "u3", MemberRole::Member);
        let peer = fixtures::member("m4", "org1", "u4", MemberRole::Member);
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[target]])
                .append_query_results([[peer]]),
        );

        let result = service.remove_member("org1", "u3", "u4").await;
        assert!(matches!(
            result,
            Err(AppError::Forbidden(msg)) if msg == "Insufficient permissions to remove member"
        ));
    }

    #[tokio::test]
    async fn test_update_role_requires_owner() {
        let target = fixtures::member("m3", "org1", "u3", MemberRole::Member);
        let admin = fixtures::member("m2", "org1", "u2", MemberRole::Admin);
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[target]])
                .append_query_results([[admin]]),
        );

        let result = service
            .update_member_role("org1", "u3", MemberRole::Admin, "u2")
            .await;
        assert!(matches!(
            result,
            Err(AppError::Forbidden(msg))
                if msg == "Only organization owners can update member roles"
        ));
    }

    #[tokio::test]
    async fn test_update_role_of_owner_rejected() {
        let owner = fixtures::owner_membership("m1", "org1", "u1");
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[owner]]));

        let result = service
            .update_member_role("org1", "u1", MemberRole::Member, "u1")
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_role_by_owner() {
        let target = fixtures::member("m3", "org1", "u3", MemberRole::Member);
        let owner = fixtures::owner_membership("m1", "org1", "u1");
        let mut promoted = target.clone();
        promoted.role = MemberRole::Admin;

        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[target]])
                .append_query_results([[owner]])
                .append_query_results([[promoted]]),
        );

        let member = service
            .update_member_role("org1", "u3", MemberRole::Admin, "u1")
            .await
            .unwrap();
        assert_eq!(member.role, MemberRole::Admin);
    }

    #[tokio::test]
    async fn test_get_members_requires_membership() {
        let org = fixtures::organization("org1", "Acme");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[org]])
                .append_query_results([no_members()]),
        );

        let result = service.get_members("org1", "stranger").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
