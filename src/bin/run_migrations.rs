use log::{error, info};
use migration::{Migrator, MigratorTrait};
use service::{config::Config, logging::Logger};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!("Applying migrations to [{}]...", config.database_schema());

    let db = match service::init_database(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    match Migrator::up(&db, None).await {
        Ok(()) => info!("Migrations applied"),
        Err(e) => {
            error!("Failed to apply migrations: {e}");
            std::process::exit(1);
        }
    }
}
