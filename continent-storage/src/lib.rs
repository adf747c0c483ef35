pub mod error;
pub mod gateway;
pub mod orm;
pub mod schema;

use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

pub use error::StorageError;
pub use gateway::PostgresGateway;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations/");

/// Runs pending migrations against `database_url` over a plain synchronous
/// connection, matching this repo's existing migration entrypoint.
pub fn run_migrations(database_url: &str) -> Result<(), StorageError> {
    info!("running continent-storage migrations");
    let mut conn = diesel::PgConnection::establish(database_url)
        .expect("connection to database should succeed");
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(StorageError::Migration)?;
    Ok(())
}
