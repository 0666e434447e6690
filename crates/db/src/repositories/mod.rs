//! Repositories wrapping sea-orm queries.

mod organization;
mod organization_member;
mod poll;
mod poll_choice;
mod poll_choice_media;
mod poll_vote;
mod refresh_token;
mod user;

pub use organization::OrganizationRepository;
pub use organization_member::OrganizationMemberRepository;
pub use poll::PollRepository;
pub use poll_choice::PollChoiceRepository;
pub use poll_choice_media::PollChoiceMediaRepository;
pub use poll_vote::PollVoteRepository;
pub use refresh_token::RefreshTokenRepository;
pub use user::UserRepository;

use pollhub_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// Map a write error, turning unique-index violations into `Conflict`.
pub(crate) fn map_write_err(err: &DbErr, conflict_message: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(conflict_message.to_string())
        }
        _ => AppError::Database(err.to_string()),
    }
}
