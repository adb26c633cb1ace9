//! SeaORM Entity for display_tokens table.
//! Bearer secrets that admit an unauthenticated public-display terminal.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "display_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Id,
    pub school_id: Id,

    /// 64 hex characters
    #[serde(skip_serializing)]
    pub token: String,

    /// Human label for the terminal, e.g. "Lobby screen"
    pub name: Option<String>,

    pub is_active: bool,
    pub last_accessed_at: Option<DateTimeWithTimeZone>,

    /// Never expires when unset
    pub expires_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::schools::Entity",
        from = "Column::SchoolId",
        to = "super::schools::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Schools,
}

impl Related<super::schools::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schools.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
