//! Database entities.

#![allow(missing_docs)]

pub mod organization;
pub mod organization_member;
pub mod poll;
pub mod poll_choice;
pub mod poll_choice_media;
pub mod poll_vote;
pub mod refresh_token;
pub mod user;

pub use organization::Entity as Organization;
pub use organization_member::Entity as OrganizationMember;
pub use poll::Entity as Poll;
pub use poll_choice::Entity as PollChoice;
pub use poll_choice_media::Entity as PollChoiceMedia;
pub use poll_vote::Entity as PollVote;
pub use refresh_token::Entity as RefreshToken;
pub use user::Entity as User;
