pub mod models;
pub mod schema;

use std::error::Error;

use tracing::{debug, info};

use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use diesel::sqlite::Sqlite;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use r2d2::CustomizeConnection;

pub type Db = Sqlite;
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

// Sample deletion must cascade with its probe
#[derive(Debug, Clone, Copy)]
struct ForeignKeysOn;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ForeignKeysOn {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query("PRAGMA foreign_keys = ON;")
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn establish_connection(database_url: &str) -> diesel::ConnectionResult<SqliteConnection> {
    SqliteConnection::establish(database_url)
}

pub fn run_migrations(
    connection: &mut impl MigrationHarness<Sqlite>,
) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    if connection.has_pending_migration(MIGRATIONS)? {
        info!("Applying pending migrations");
        connection.run_pending_migrations(MIGRATIONS)?;
    } else {
        debug!("No pending migrations");
    }
    Ok(())
}

/// Opens the database once, applying any pending migration.
pub fn init(database_url: &str) -> anyhow::Result<()> {
    let mut connection = establish_connection(database_url)?;
    run_migrations(&mut connection).map_err(|e| anyhow::anyhow!("migrations failed: {e}"))?;
    info!("Opened database {}", database_url);
    Ok(())
}

pub fn get_connection_pool(database_url: &str) -> anyhow::Result<Pool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .connection_customizer(Box::new(ForeignKeysOn))
        .build(manager)?;
    Ok(pool)
}
