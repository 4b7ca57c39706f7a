use anyhow::Result;
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing::{debug, error, info, trace};

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");
    debug!("Database URL: {}", database_url);

    let db = connect(database_url).await?;
    apply_migrations(&db).await?;

    info!("Database initialization completed successfully!");
    Ok(())
}

pub(crate) async fn connect(database_url: &str) -> Result<DatabaseConnection> {
    trace!("Attempting to connect to database");
    match Database::connect(database_url).await {
        Ok(connection) => {
            info!("Successfully connected to database");
            Ok(connection)
        }
        Err(e) => {
            error!("Failed to connect to database '{}': {}", database_url, e);
            Err(e.into())
        }
    }
}

pub(crate) async fn apply_migrations(db: &DatabaseConnection) -> Result<()> {
    info!("Running database migrations");
    match Migrator::up(db, None).await {
        Ok(_) => {
            info!("Database migrations completed successfully");
            debug!("All pending migrations have been applied");
            Ok(())
        }
        Err(e) => {
            error!("Failed to run database migrations: {}", e);
            Err(e.into())
        }
    }
}
