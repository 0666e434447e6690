//! Create `organization` and `organization_member` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Organization::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Organization::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Organization::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Organization::Description).text())
                    .col(ColumnDef::new(Organization::Website).string_len(2048))
                    .col(ColumnDef::new(Organization::Email).string_len(320))
                    .col(ColumnDef::new(Organization::Phone).string_len(20))
                    .col(
                        ColumnDef::new(Organization::OrganizationType)
                            .string_len(20)
                            .not_null()
                            .default("Group"),
                    )
                    .col(
                        ColumnDef::new(Organization::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Organization::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Organization::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Organization names are unique
        manager
            .create_index(
                Index::create()
                    .name("idx_organization_name_unique")
                    .table(Organization::Table)
                    .col(Organization::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrganizationMember::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrganizationMember::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OrganizationMember::OrganizationId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrganizationMember::UserId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrganizationMember::Role)
                            .string_len(20)
                            .not_null()
                            .default("MEMBER"),
                    )
                    .col(
                        ColumnDef::new(OrganizationMember::Status)
                            .string_len(20)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(ColumnDef::new(OrganizationMember::InvitedBy).string_len(32))
                    .col(ColumnDef::new(OrganizationMember::InvitedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OrganizationMember::JoinedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(OrganizationMember::ExpiresAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(OrganizationMember::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(OrganizationMember::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_organization_member_organization")
                            .from(OrganizationMember::Table, OrganizationMember::OrganizationId)
                            .to(Organization::Table, Organization::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_organization_member_user")
                            .from(OrganizationMember::Table, OrganizationMember::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_organization_member_inviter")
                            .from(OrganizationMember::Table, OrganizationMember::InvitedBy)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // One membership row per (organization, user)
        manager
            .create_index(
                Index::create()
                    .name("idx_organization_member_unique")
                    .table(OrganizationMember::Table)
                    .col(OrganizationMember::OrganizationId)
                    .col(OrganizationMember::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_organization_member_user_status")
                    .table(OrganizationMember::Table)
                    .col(OrganizationMember::UserId)
                    .col(OrganizationMember::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrganizationMember::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Organization::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Organization {
    Table,
    Id,
    Name,
    Description,
    Website,
    Email,
    Phone,
    OrganizationType,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum OrganizationMember {
    Table,
    Id,
    OrganizationId,
    UserId,
    Role,
    Status,
    InvitedBy,
    InvitedAt,
    JoinedAt,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
