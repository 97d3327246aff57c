//! Table loader.
//!
//! Persists normalized tables into a relational store through SQLx's `Any`
//! driver, so the same code writes to SQLite (`sqlite:...`) or PostgreSQL
//! (`postgres://...`). Every column, including the appended `ingest_date`,
//! is stored as nullable `TEXT`.
//!
//! Each table is written in its own transaction; there is no guarantee across
//! tables.
//!
//! # Example
//!
//! ```ignore
//! use spotetl::store::{SqlLoader, load_tables};
//!
//! let loader = SqlLoader::connect("sqlite:spotetl.db").await?;
//! let written = load_tables(&loader, &tables, WriteMode::Append).await?;
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    Any, AnyPool,
    any::AnyPoolOptions,
    migrate::MigrateDatabase,
};

use crate::{
    config::WriteMode,
    error::{Error, Result},
    normalize::{Record, Table},
    pipeline::Tables,
};

pub const INGEST_COLUMN: &str = "ingest_date";

/// Accepts finished tables.
#[async_trait]
pub trait TableLoader: Send + Sync {
    /// Writes `records` into `table` and returns the number of rows written.
    async fn load(
        &self,
        table: Table,
        records: &[Record],
        mode: WriteMode,
        ingest_date: &str,
    ) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Sqlite,
    Postgres,
}

pub struct SqlLoader {
    pool: AnyPool,
    backend: Backend,
}

impl SqlLoader {
    /// Connects to `database_url`, creating a missing SQLite file first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for URLs that are neither `sqlite:` nor
    /// `postgres:`/`postgresql:`, and [`Error::Database`] when the connection
    /// fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let backend = if database_url.starts_with("sqlite:") {
            Backend::Sqlite
        } else if database_url.starts_with("postgres:") || database_url.starts_with("postgresql:") {
            Backend::Postgres
        } else {
            return Err(Error::Config(format!(
                "unsupported DATABASE_URL '{}', expected sqlite: or postgres://",
                database_url
            )));
        };

        if backend == Backend::Sqlite && !Any::database_exists(database_url).await.unwrap_or(false) {
            Any::create_database(database_url).await?;
        }

        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool, backend })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn count_rows(&self, table: Table) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(table.name()));
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    fn placeholder(&self, index: usize) -> String {
        match self.backend {
            Backend::Sqlite => "?".to_string(),
            Backend::Postgres => format!("${}", index),
        }
    }
}

#[async_trait]
impl TableLoader for SqlLoader {
    async fn load(
        &self,
        table: Table,
        records: &[Record],
        mode: WriteMode,
        ingest_date: &str,
    ) -> Result<u64> {
        let mut columns: Vec<&str> = table.columns().to_vec();
        columns.push(INGEST_COLUMN);

        let create = create_table_sql(table, &columns);
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote(table.name()),
            columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", "),
            (1..=columns.len())
                .map(|i| self.placeholder(i))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut tx = self.pool.begin().await?;

        if mode == WriteMode::Replace {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote(table.name())))
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(&create).execute(&mut *tx).await?;

        let mut written = 0u64;
        for record in records {
            let mut query = sqlx::query(&insert);
            for value in record.values() {
                query = query.bind(value);
            }
            query = query.bind(ingest_date.to_string());
            written += query.execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        tracing::debug!(table = table.name(), rows = written, ?mode, "table written");
        Ok(written)
    }
}

/// Writes every non-empty table with one shared ingest timestamp.
///
/// Empty tables are skipped so that a `Replace` run never wipes a table with
/// nothing.
pub async fn load_tables<L>(loader: &L, tables: &Tables, mode: WriteMode) -> Result<Vec<(Table, u64)>>
where
    L: TableLoader + ?Sized,
{
    let ingest_date = Utc::now().to_rfc3339();
    let mut written = Vec::new();

    for (table, records) in tables.iter() {
        if records.is_empty() {
            tracing::info!(table = table.name(), "no rows, table left untouched");
            continue;
        }
        let rows = loader.load(table, records, mode, &ingest_date).await?;
        tracing::info!(table = table.name(), rows, "table loaded");
        written.push((table, rows));
    }

    Ok(written)
}

fn create_table_sql(table: Table, columns: &[&str]) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(table.name()),
        columns
            .iter()
            .map(|c| format!("{} TEXT", quote(c)))
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
