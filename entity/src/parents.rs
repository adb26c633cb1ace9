use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A guardian. Notifications are addressed to the guardian's user account.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Id,
    pub school_id: Id,
    pub user_id: Id,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::student_parents::Entity")]
    StudentParents,
}

impl Related<super::students::Entity> for Entity {
    fn to() -> RelationDef {
        super::student_parents::Relation::Students.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::student_parents::Relation::Parents.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
