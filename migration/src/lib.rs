pub use sea_orm_migration::prelude::*;

mod m20240716_000001_create_notification_queue;
mod m20240716_000002_create_delivery_outcomes;

/// Migrations for the tables this service owns. The school records
/// (students, classes, attendances, guardians, device and display tokens)
/// belong to the attendance application and are never migrated here.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240716_000001_create_notification_queue::Migration),
            Box::new(m20240716_000002_create_delivery_outcomes::Migration),
        ]
    }
}
