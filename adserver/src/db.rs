//! Database wiring: connection pool construction and migrations.
//!
//! Mirrors the teacher's split between a thin `db.rs` that owns the pool
//! type alias and per-entity modules (`db::wallet`, `db::campaign`, ...)
//! that hold the prepared-statement queries.

use deadpool_postgres::{
    tokio_postgres::NoTls, Config as PgConfig, CreatePoolError, Pool, PoolError as DeadpoolError,
    Runtime,
};
use migrant_lib::{Config as MigrantConfig, Migrator, Settings};
use std::path::Path;
use thiserror::Error;

pub mod ad;
pub mod campaign;
pub mod impression;
pub mod wallet;

pub type DbPool = Pool;
pub type PoolError = DeadpoolError;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to create the Postgres pool: {0}")]
    CreatePool(#[from] CreatePoolError),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Infra-level Postgres connection parameters, populated from the
/// environment by `Config::from_env()` (see `crate::application`).
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub max_pool_size: usize,
}

pub async fn postgres_connection(config: &PostgresConfig) -> Result<DbPool, DbError> {
    let mut pg_config = PgConfig::new();
    pg_config.host = Some(config.host.clone());
    pg_config.port = Some(config.port);
    pg_config.dbname = Some(config.dbname.clone());
    pg_config.user = Some(config.user.clone());
    pg_config.password = Some(config.password.clone());

    let pool = pg_config.create_pool(Some(Runtime::Tokio1), NoTls)?;
    pool.resize(config.max_pool_size);

    Ok(pool)
}

/// Applies the SQL migrations under `adserver/migrations` using
/// `migrant_lib`, the same migration runner the teacher wires into its
/// own `setup_migrations`.
pub fn setup_migrations(database_url: &str) -> Result<(), DbError> {
    let settings = Settings::configure_postgres()
        .database_url(database_url)
        .build()
        .map_err(|err| DbError::Migration(err.to_string()))?;

    let mut config = MigrantConfig::with_settings(&settings);
    config
        .setup()
        .map_err(|err| DbError::Migration(err.to_string()))?;

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    config = config
        .use_cli_compatible_tags(true)
        .reload()
        .map_err(|err| DbError::Migration(err.to_string()))?;
    config
        .scan_migrations(&[migrations_dir])
        .map_err(|err| DbError::Migration(err.to_string()))?;

    Migrator::with_config(&config)
        .all(true)
        .apply()
        .map_err(|err| DbError::Migration(err.to_string()))?;

    Ok(())
}
