use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Id,
    pub school_id: Id,
    /// Unset while a student is imported but not yet placed in a class.
    pub class_id: Option<Id>,
    /// School-local student number
    pub nis: String,
    /// National student identifier
    pub nisn: String,
    pub name: String,
    /// Only active students count towards attendance statistics.
    pub is_active: bool,
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
    #[sea_orm(
        belongs_to = "super::classes::Entity",
        from = "Column::ClassId",
        to = "super::classes::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Classes,
    #[sea_orm(has_many = "super::attendances::Entity")]
    Attendances,
    #[sea_orm(has_many = "super::student_parents::Entity")]
    StudentParents,
}

impl Related<super::schools::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schools.def()
    }
}

impl Related<super::classes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Classes.def()
    }
}

impl Related<super::attendances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendances.def()
    }
}

impl Related<super::parents::Entity> for Entity {
    fn to() -> RelationDef {
        super::student_parents::Relation::Parents.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::student_parents::Relation::Students.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
