//! Business logic services.

#![allow(missing_docs)]

pub mod auth;
pub mod auth_events;
pub mod maintenance;
pub mod media;
pub mod organization;
pub mod organization_validator;
pub mod poll;
pub mod poll_choice;
pub mod token;
pub mod user;

pub use auth::{AuthService, AuthToken, LoginInput, RefreshTokenInput};
pub use auth_events::{
    AuthEventKind, AuthEventPublisher, AuthEventPublisherService, LoggingAuthEventPublisher,
    NoOpAuthEventPublisher,
};
pub use maintenance::{
    MaintenanceReport, MaintenanceTasks, ServiceMaintenance, run_maintenance, run_once,
};
pub use media::{FileValidation, MediaService, StoredFile, UploadedFile};
pub use organization::{
    CreateOrganizationInput, InviteUserInput, OrganizationService, UpdateOrganizationInput,
};
pub use organization_validator::{DefaultOrganizationValidator, OrganizationValidator};
pub use poll::{
    CastVoteInput, ChoiceResult, CreatePollInput, PollDetail, PollResults, PollService,
    UpdatePollInput,
};
pub use poll_choice::{AddChoiceInput, ChoiceWithMedia, PollChoiceService, UpdateChoiceInput};
pub use token::{Claims, IssuedToken, TokenCodec, TokenFailure, TokenKind, hash_token};
pub use user::{ChangePasswordInput, CreateUserInput, UpdateProfileInput, UserService};

use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" from an explicit `null`.
///
/// Pair with `#[serde(default)]`: a missing key yields `None`, `null` yields
/// `Some(None)`.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::deserialize(deserializer).map(Some)
}
