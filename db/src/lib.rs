use std::time::Duration;

use erp_query_config::DatabaseConfig;
use serde::Serialize;
use sqlx::{Connection as _, Sqlite, SqliteConnection, sqlite::SqlitePoolOptions};
use tracing::error;

pub use sqlx::SqlitePool as DbPool;

/// Creates a connection pool to the database specified in the passed [`DatabaseConfig`]
///
/// The pool holds at most `pool_size + max_overflow` connections, recycles them after
/// `pool_recycle` seconds and pings every connection before handing it out.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<DbPool, Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections((config.pool_size + config.max_overflow).max(1))
        .acquire_timeout(Duration::from_secs(config.pool_timeout))
        .max_lifetime(Duration::from_secs(config.pool_recycle))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    Ok(pool)
}

/// Checks whether the database is reachable and usable.
///
/// Opens a dedicated connection, runs `SELECT 1` and closes it again. The whole probe is
/// bounded by `pool_timeout`. Failures are logged and reported as `false`; callers only
/// get to see the outcome.
pub async fn check_health(config: &DatabaseConfig) -> bool {
    let timeout = Duration::from_secs(config.pool_timeout);

    match tokio::time::timeout(timeout, probe(config)).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!("database health check failed: {err}");
            false
        }
        Err(_) => {
            error!(
                timeout_secs = config.pool_timeout,
                "database health check timed out"
            );
            false
        }
    }
}

/// Runs the health query against a live pool.
pub async fn ping(db_pool: &DbPool) -> Result<(), Error> {
    select_one(db_pool).await
}

async fn probe(config: &DatabaseConfig) -> Result<(), Error> {
    let mut conn = SqliteConnection::connect(&config.url).await?;
    let result = select_one(&mut conn).await;
    conn.close().await?;

    result
}

async fn select_one<'e, E>(executor: E) -> Result<(), Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(executor).await?;

    match one {
        1 => Ok(()),
        other => Err(Error::UnexpectedProbeResult(other)),
    }
}

/// A snapshot of the pool's connection usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionInfo {
    pub size: u32,
    pub idle: usize,
    pub in_use: usize,
    pub max_connections: u32,
}

pub fn connection_info(db_pool: &DbPool) -> ConnectionInfo {
    let size = db_pool.size();
    let idle = db_pool.num_idle();

    ConnectionInfo {
        size,
        idle,
        in_use: (size as usize).saturating_sub(idle),
        max_connections: db_pool.options().get_max_connections(),
    }
}

/// Errors that can occur as a result of a data layer operation.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// General database error, e.g. communicating with the database failed
    #[error("database query failed: {0}")]
    DatabaseError(#[from] sqlx::Error),
    /// The health query answered, but not with the expected value.
    #[error("health query returned {0} instead of 1")]
    UnexpectedProbeResult(i64),
}
