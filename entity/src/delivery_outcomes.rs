//! SeaORM Entity for delivery_outcomes table.
//! Append-only history, one row per delivery attempt.

use crate::delivery_result::DeliveryResult;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_outcomes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub recipient_user_id: Id,
    pub target_ref: String,
    pub result: DeliveryResult,
    pub attempt: i32,
    #[sea_orm(column_type = "Text")]
    pub detail: Option<String>,
    pub recorded_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
