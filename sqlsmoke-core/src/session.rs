//! The sequential session driver.
//!
//! One linear flow: probe the server, re-create the employee table, seed
//! it, attempt the oversized insert inside a transaction, read server
//! metadata, stream the rows back. Every failure is fatal except the two
//! classified in [`crate::error::tolerated`].

use futures::TryStreamExt;
use sqlx::{Connection, FromRow, PgPool};
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::context::SessionContext;
use crate::employee::Employee;
use crate::error::{tolerated, Result, SessionError, Tolerated};

const DROP_EMPLOYEE: &str = "DROP TABLE IF EXISTS employee";

const CREATE_EMPLOYEE: &str = "
    CREATE TABLE employee (
        id INT,
        name VARCHAR(20),
        start_dt TIMESTAMP,
        is_remote BOOLEAN
    )";

const SEED_EMPLOYEES: &str = "
    INSERT INTO employee (id, name, start_dt, is_remote)
    VALUES
        (1, 'John Doe', '2022-01-01 09:00:00', TRUE),
        (2, 'Jane Smith', '2023-03-15 10:00:00', FALSE)";

/// The id does not fit the column's INT range; executing this statement is
/// expected to fail with SQLSTATE 22003.
const OVERSIZED_INSERT: &str = "
    INSERT INTO employee (id, name, start_dt, is_remote)
    VALUES
        (3000000000, 'id int64 instead of int32', '2022-06-17 11:00:00', TRUE)";

const SELECT_EMPLOYEES: &str = "SELECT id, name, start_dt, is_remote FROM employee";

const VERSION_QUERY: &str = "SELECT version()";

/// Acquire a connection and ping it under the probe deadline.
pub async fn verify_reachable(
    ctx: &SessionContext,
    pool: &PgPool,
    cfg: &SessionConfig,
) -> Result<()> {
    ctx.scoped_db("liveness probe", cfg.ping_timeout, async {
        let mut conn = pool.acquire().await?;
        conn.ping().await
    })
    .await
}

/// Drop-if-exists then create, so every run starts from an empty table of
/// the same shape.
pub async fn reset_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(DROP_EMPLOYEE)
        .execute(pool)
        .await
        .map_err(|source| SessionError::db("drop table", source))?;

    sqlx::query(CREATE_EMPLOYEE)
        .execute(pool)
        .await
        .map_err(|source| SessionError::db("create table", source))?;

    Ok(())
}

/// Insert the two well-formed rows in one statement under the statement
/// deadline.
pub async fn seed_employees(
    ctx: &SessionContext,
    pool: &PgPool,
    cfg: &SessionConfig,
) -> Result<()> {
    ctx.scoped_db("bulk insert", cfg.statement_timeout, async {
        sqlx::query(SEED_EMPLOYEES).execute(pool).await.map(|_| ())
    })
    .await
}

/// Begin a transaction, attempt the oversized insert, commit regardless.
///
/// The out-of-range rejection is logged and tolerated; the commit then
/// carries zero effective statements. Any other statement failure, and any
/// commit failure, is fatal. Dropping the transaction without commit rolls
/// it back.
pub async fn insert_oversized_id(pool: &PgPool) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|source| SessionError::db("begin transaction", source))?;

    match sqlx::query(OVERSIZED_INSERT).execute(&mut *tx).await {
        Ok(_) => {}
        Err(err) if tolerated(&err) == Some(Tolerated::ValueOutOfRange) => {
            warn!(error = %err, "oversized id insert rejected");
        }
        Err(source) => return Err(SessionError::db("transactional insert", source)),
    }

    tx.commit()
        .await
        .map_err(|source| SessionError::db("commit", source))
}

/// Query the server version scalar. Zero rows is a distinguished, non-fatal
/// outcome.
pub async fn server_version(pool: &PgPool) -> Result<Option<String>> {
    match sqlx::query_scalar::<_, String>(VERSION_QUERY)
        .fetch_one(pool)
        .await
    {
        Ok(version) => Ok(Some(version)),
        Err(err) if tolerated(&err) == Some(Tolerated::NoRows) => {
            info!("No rows found.");
            Ok(None)
        }
        Err(source) => Err(SessionError::db("version query", source)),
    }
}

/// Stream employee rows one at a time into `sink`, under the statement
/// deadline. Result order is whatever the engine returns.
///
/// The two error phases stay distinct: each yielded row is decoded
/// explicitly ("row decode"), and an error item from the stream itself,
/// possibly after rows were already yielded, fails the read ("row read").
pub async fn stream_employees<F>(
    ctx: &SessionContext,
    pool: &PgPool,
    cfg: &SessionConfig,
    mut sink: F,
) -> Result<usize>
where
    F: FnMut(Employee),
{
    ctx.scoped("row read", cfg.statement_timeout, async {
        let mut rows = sqlx::query(SELECT_EMPLOYEES).fetch(pool);
        let mut count = 0usize;

        while let Some(row) = rows
            .try_next()
            .await
            .map_err(|source| SessionError::db("row read", source))?
        {
            let employee = Employee::from_row(&row)
                .map_err(|source| SessionError::db("row decode", source))?;
            sink(employee);
            count += 1;
        }

        Ok(count)
    })
    .await
}

/// Execute the full session sequence against the configured server and
/// print the results.
pub async fn run(ctx: &SessionContext, cfg: &SessionConfig) -> Result<()> {
    let pool = cfg.pool()?;

    verify_reachable(ctx, &pool, cfg).await?;
    reset_schema(&pool).await?;
    seed_employees(ctx, &pool, cfg).await?;
    insert_oversized_id(&pool).await?;

    if let Some(version) = server_version(&pool).await? {
        println!("SERVER VERSION: {version}");
    }

    println!("Results:");
    let printed = stream_employees(ctx, &pool, cfg, |employee| println!("{employee}")).await?;
    info!("printed {} employee rows", printed);

    pool.close().await;
    Ok(())
}
