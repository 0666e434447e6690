//! Create `poll`, `poll_choice`, `poll_choice_media`, and `poll_vote` tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Poll::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Poll::Title).string_len(200).not_null())
                    .col(ColumnDef::new(Poll::Description).text())
                    .col(ColumnDef::new(Poll::CreatedBy).string_len(32).not_null())
                    .col(ColumnDef::new(Poll::OrganizationId).string_len(32))
                    .col(
                        ColumnDef::new(Poll::PollType)
                            .string_len(20)
                            .not_null()
                            .default("PUBLIC"),
                    )
                    .col(
                        ColumnDef::new(Poll::ResultDisplayType)
                            .string_len(20)
                            .not_null()
                            .default("CLOSED"),
                    )
                    .col(
                        ColumnDef::new(Poll::Status)
                            .string_len(20)
                            .not_null()
                            .default("DRAFT"),
                    )
                    .col(
                        ColumnDef::new(Poll::VotingEndsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Poll::AllowMultipleChoices)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Poll::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(Poll::MainImageUrl).string_len(2048))
                    .col(ColumnDef::new(Poll::MainImageKey).string_len(512))
                    .col(
                        ColumnDef::new(Poll::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Poll::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_creator")
                            .from(Poll::Table, Poll::CreatedBy)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_organization")
                            .from(Poll::Table, Poll::OrganizationId)
                            .to(Organization::Table, Organization::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_created_by")
                    .table(Poll::Table)
                    .col(Poll::CreatedBy)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_organization_id")
                    .table(Poll::Table)
                    .col(Poll::OrganizationId)
                    .to_owned(),
            )
            .await?;

        // Maintenance loop scans ACTIVE polls by deadline
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_status_voting_ends_at")
                    .table(Poll::Table)
                    .col(Poll::Status)
                    .col(Poll::VotingEndsAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollChoice::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollChoice::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PollChoice::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(PollChoice::Name).string_len(200).not_null())
                    .col(ColumnDef::new(PollChoice::Description).text())
                    .col(ColumnDef::new(PollChoice::MediaUrl).string_len(2048))
                    .col(ColumnDef::new(PollChoice::MediaType).string_len(20))
                    .col(ColumnDef::new(PollChoice::MediaFileName).string_len(512))
                    .col(
                        ColumnDef::new(PollChoice::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PollChoice::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PollChoice::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_choice_poll")
                            .from(PollChoice::Table, PollChoice::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_choice_poll_order")
                    .table(PollChoice::Table)
                    .col(PollChoice::PollId)
                    .col(PollChoice::DisplayOrder)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollChoiceMedia::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PollChoiceMedia::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PollChoiceMedia::PollChoiceId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PollChoiceMedia::FileName).string_len(512).not_null())
                    .col(
                        ColumnDef::new(PollChoiceMedia::OriginalName)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(PollChoiceMedia::Url).string_len(2048).not_null())
                    .col(ColumnDef::new(PollChoiceMedia::MediaType).string_len(20).not_null())
                    .col(ColumnDef::new(PollChoiceMedia::MimeType).string_len(128).not_null())
                    .col(ColumnDef::new(PollChoiceMedia::Size).big_integer().not_null())
                    .col(
                        ColumnDef::new(PollChoiceMedia::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PollChoiceMedia::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(PollChoiceMedia::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_choice_media_choice")
                            .from(PollChoiceMedia::Table, PollChoiceMedia::PollChoiceId)
                            .to(PollChoice::Table, PollChoice::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_choice_media_choice")
                    .table(PollChoiceMedia::Table)
                    .col(PollChoiceMedia::PollChoiceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollVote::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PollVote::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(PollVote::PollId).string_len(32).not_null())
                    .col(ColumnDef::new(PollVote::ChoiceId).string_len(32).not_null())
                    .col(ColumnDef::new(PollVote::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(PollVote::VotedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_vote_poll")
                            .from(PollVote::Table, PollVote::PollId)
                            .to(Poll::Table, Poll::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_vote_choice")
                            .from(PollVote::Table, PollVote::ChoiceId)
                            .to(PollChoice::Table, PollChoice::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_poll_vote_user")
                            .from(PollVote::Table, PollVote::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One vote per (poll, choice, user)
        manager
            .create_index(
                Index::create()
                    .name("idx_poll_vote_unique")
                    .table(PollVote::Table)
                    .col(PollVote::PollId)
                    .col(PollVote::ChoiceId)
                    .col(PollVote::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_vote_poll_user")
                    .table(PollVote::Table)
                    .col(PollVote::PollId)
                    .col(PollVote::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollVote::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PollChoiceMedia::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PollChoice::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    Id,
    Title,
    Description,
    CreatedBy,
    OrganizationId,
    PollType,
    ResultDisplayType,
    Status,
    VotingEndsAt,
    AllowMultipleChoices,
    IsActive,
    MainImageUrl,
    MainImageKey,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum PollChoice {
    Table,
    Id,
    PollId,
    Name,
    Description,
    MediaUrl,
    MediaType,
    MediaFileName,
    DisplayOrder,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum PollChoiceMedia {
    Table,
    Id,
    PollChoiceId,
    FileName,
    OriginalName,
    Url,
    MediaType,
    MimeType,
    Size,
    DisplayOrder,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum PollVote {
    Table,
    Id,
    PollId,
    ChoiceId,
    UserId,
    VotedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Organization {
    Table,
    Id,
}
