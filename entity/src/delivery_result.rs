use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Result of one delivery attempt, as stored in `delivery_outcomes`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Serialize, DeriveActiveEnum)]
#[serde(rename_all = "snake_case")]
#[sea_orm(
    rs_type = "String",
    db_type = "Enum",
    enum_name = "delivery_result"
)]
pub enum DeliveryResult {
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "retry_scheduled")]
    RetryScheduled,
    #[sea_orm(string_value = "failed_permanent")]
    FailedPermanent,
}
