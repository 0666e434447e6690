//! Poll choice media entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::poll_choice::MediaType;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll_choice_media")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub poll_choice_id: String,

    /// Storage key.
    pub file_name: String,

    /// Name the file was uploaded with.
    pub original_name: String,

    pub url: String,

    pub media_type: MediaType,

    pub mime_type: String,

    /// Size in bytes.
    pub size: i64,

    /// Zero-based position within the choice, in upload order.
    pub display_order: i32,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poll_choice::Entity",
        from = "Column::PollChoiceId",
        to = "super::poll_choice::Column::Id",
        on_delete = "Cascade"
    )]
    PollChoice,
}

impl Related<super::poll_choice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollChoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
