use anyhow::Result;
use tracing::{debug, info, trace};

use super::initdb::{apply_migrations, connect};
use super::serve::run_server;
use crate::config::{build_app_state, Settings};

pub async fn migrate_and_serve(settings: &Settings) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");
    debug!("Database URL: {}", settings.database_url);
    debug!("Bind address: {}", settings.bind_address);

    let db = connect(&settings.database_url).await?;
    apply_migrations(&db).await?;

    // Reuse the migrated connection; an in-memory SQLite database would not survive a reconnect.
    let state = build_app_state(db, settings)?;
    debug!("Application state initialized successfully");

    run_server(state, &settings.bind_address).await
}
