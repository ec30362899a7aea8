use super::model::{record_from_row, ColumnValues};
use crate::model::Record;
use crate::resource::Resource;
use anyhow::{bail, Context, Result};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use std::path::Path;
use tracing::{debug, instrument};

pub type Pool = SqlitePool;

/// SQL expression for the current instant, matching the column defaults.
const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url)?;
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open database {normalized}"))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/` and ensure the parent
/// directory exists. Leaves in-memory and non-sqlite URLs untouched.
fn prepare_sqlite_url(url: &str) -> Result<String> {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return Ok(url.to_string());
    };
    if rest.starts_with(":memory") {
        return Ok(url.to_string());
    }

    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return Ok(url.to_string());
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let mut rebuilt = format!("sqlite://{expanded_path}");
    if let Some(q) = query_part {
        rebuilt.push('?');
        rebuilt.push_str(q);
    } else {
        // Create the database file on first start.
        rebuilt.push_str("?mode=rwc");
    }
    Ok(rebuilt)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Newest first; `id` breaks ties between rows created in the same millisecond.
#[instrument(skip_all, fields(table = resource.table, start = start, limit = limit))]
pub async fn list_records(
    pool: &Pool,
    resource: &Resource,
    start: i64,
    limit: i64,
) -> Result<Vec<Record>> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        resource.select_list(),
        resource.table
    );
    let rows = sqlx::query(&sql)
        .bind(limit)
        .bind(start)
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to list {}", resource.table))?;
    rows.iter()
        .map(|row| record_from_row(resource, row))
        .collect()
}

#[instrument(skip_all, fields(table = resource.table, id = id))]
pub async fn get_record(pool: &Pool, resource: &Resource, id: i64) -> Result<Option<Record>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?",
        resource.select_list(),
        resource.table
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("failed to read {} {}", resource.table, id))?;
    row.map(|row| record_from_row(resource, &row)).transpose()
}

#[instrument(skip_all, fields(table = resource.table))]
pub async fn insert_record(
    pool: &Pool,
    resource: &Resource,
    values: &ColumnValues,
) -> Result<Record> {
    if values.is_empty() {
        bail!("nothing to insert into {}", resource.table);
    }
    let columns: Vec<&str> = values.values.iter().map(|(c, _)| *c).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        resource.table,
        columns.join(", "),
        vec!["?"; columns.len()].join(", "),
        resource.select_list()
    );
    let mut query = sqlx::query(&sql);
    for (_, value) in &values.values {
        query = query.bind(value.as_deref());
    }
    let row = query
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to insert into {}", resource.table))?;
    let record = record_from_row(resource, &row)?;
    debug!(id = record.id, "inserted record");
    Ok(record)
}

/// Write transaction opened with `BEGIN IMMEDIATE`, so the write lock is held
/// before the first read and a stale WAL snapshot cannot fail the upgrade.
///
/// A guard dropped without [`commit`](Self::commit) closes its connection,
/// which rolls the transaction back.
struct WriteTx {
    conn: PoolConnection<Sqlite>,
    open: bool,
}

impl WriteTx {
    async fn begin(pool: &Pool) -> Result<Self> {
        let mut conn = pool.acquire().await.context("failed to acquire connection")?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .context("failed to begin write transaction")?;
        Ok(Self { conn, open: true })
    }

    fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    async fn commit(mut self) -> Result<()> {
        sqlx::query("COMMIT")
            .execute(&mut *self.conn)
            .await
            .context("failed to commit")?;
        self.open = false;
        Ok(())
    }
}

impl Drop for WriteTx {
    fn drop(&mut self) {
        if self.open {
            self.conn.close_on_drop();
        }
    }
}

/// Apply a partial update. Returns `None` when no row has `id`.
#[instrument(skip_all, fields(table = resource.table, id = id))]
pub async fn update_record(
    pool: &Pool,
    resource: &Resource,
    id: i64,
    values: &ColumnValues,
) -> Result<Option<Record>> {
    let mut tx = WriteTx::begin(pool).await?;
    let matched = sqlx::query_scalar::<_, i64>(&format!(
        "SELECT id FROM {} WHERE id = ?",
        resource.table
    ))
    .bind(id)
    .fetch_optional(tx.conn())
    .await
    .with_context(|| format!("failed to match {} {}", resource.table, id))?;
    if matched.is_none() {
        tx.commit().await?;
        return Ok(None);
    }

    let assignments: Vec<String> = values
        .values
        .iter()
        .map(|(c, _)| {
            if values.patch {
                format!("{c} = json_patch({c}, ?)")
            } else {
                format!("{c} = ?")
            }
        })
        .chain(std::iter::once(format!("updated_at = {NOW_SQL}")))
        .collect();
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ? RETURNING {}",
        resource.table,
        assignments.join(", "),
        resource.select_list()
    );
    let mut query = sqlx::query(&sql);
    for (_, value) in &values.values {
        query = query.bind(value.as_deref());
    }
    let row = query
        .bind(id)
        .fetch_one(tx.conn())
        .await
        .with_context(|| format!("failed to update {} {}", resource.table, id))?;
    let record = record_from_row(resource, &row)?;
    tx.commit().await?;
    Ok(Some(record))
}

/// Delete by id, returning the removed row. `None` when no row has `id`.
#[instrument(skip_all, fields(table = resource.table, id = id))]
pub async fn delete_record(pool: &Pool, resource: &Resource, id: i64) -> Result<Option<Record>> {
    let mut tx = WriteTx::begin(pool).await?;
    let row = sqlx::query(&format!(
        "SELECT {} FROM {} WHERE id = ?",
        resource.select_list(),
        resource.table
    ))
    .bind(id)
    .fetch_optional(tx.conn())
    .await
    .with_context(|| format!("failed to match {} {}", resource.table, id))?;
    let Some(row) = row else {
        tx.commit().await?;
        return Ok(None);
    };
    let record = record_from_row(resource, &row)?;

    sqlx::query(&format!("DELETE FROM {} WHERE id = ?", resource.table))
        .bind(id)
        .execute(tx.conn())
        .await
        .with_context(|| format!("failed to delete {} {}", resource.table, id))?;
    tx.commit().await?;
    Ok(Some(record))
}

#[instrument(skip_all, fields(table = resource.table))]
pub async fn count_records(pool: &Pool, resource: &Resource) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", resource.table))
        .fetch_one(pool)
        .await?;
    Ok(count)
}
