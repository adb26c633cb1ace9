//! SeaORM Entity for notification_jobs table.
//! The durable delivery queue. A row is deleted once its job reached a
//! terminal outcome.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notification_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Serialized job as produced by the enqueuer
    #[sea_orm(column_type = "JsonBinary")]
    pub payload: Json,

    /// The job is not handed out before this instant; while a worker holds
    /// the job this is its lease expiry
    pub available_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
