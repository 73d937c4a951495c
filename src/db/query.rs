//! Parameterized query execution and row-to-entity mapping.
//!
//! The SELECT helpers map rows into entities through sqlx's `FromRow`, so a
//! query's column names (or aliases) must line up with the entity's derived
//! field mapping. Placeholders are bound positionally from a [`SqlParam`]
//! slice, in slice order.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, Postgres, Row};

use crate::error::Result;
use crate::transaction::TransactionManager;

/// A positional query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl SqlParam {
    fn bind_to<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        match self {
            SqlParam::Int(v) => query.bind(*v),
            SqlParam::Float(v) => query.bind(*v),
            SqlParam::Text(v) => query.bind(v.clone()),
            SqlParam::Bool(v) => query.bind(*v),
            SqlParam::Null => query.bind(Option::<String>::None),
        }
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

fn build_query<'q>(sql: &'q str, params: &[SqlParam]) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = param.bind_to(query);
    }
    query
}

/// Load at most one entity. `None` when the query matches no row.
pub async fn load_one<T>(
    tx: &mut TransactionManager,
    sql: &str,
    params: &[SqlParam],
) -> Result<Option<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let conn = tx.active_connection()?;
    let row = build_query(sql, params).fetch_optional(conn).await?;
    row.map(|r| T::from_row(&r)).transpose().map_err(Into::into)
}

/// Load every matching entity, in result-set order.
pub async fn load_many<T>(
    tx: &mut TransactionManager,
    sql: &str,
    params: &[SqlParam],
) -> Result<Vec<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let conn = tx.active_connection()?;
    let rows = build_query(sql, params).fetch_all(conn).await?;
    rows.iter()
        .map(|r| T::from_row(r).map_err(Into::into))
        .collect()
}

/// Load a single integer scalar from the first column of the first row.
/// `None` when the query matches no row or the value is SQL NULL.
pub async fn load_scalar_i64(
    tx: &mut TransactionManager,
    sql: &str,
    params: &[SqlParam],
) -> Result<Option<i64>> {
    let conn = tx.active_connection()?;
    let row = build_query(sql, params).fetch_optional(conn).await?;
    match row {
        Some(row) => Ok(row.try_get::<Option<i64>, _>(0)?),
        None => Ok(None),
    }
}

/// Execute an INSERT/UPDATE/DELETE and return the affected row count.
pub async fn update(tx: &mut TransactionManager, sql: &str, params: &[SqlParam]) -> Result<u64> {
    let conn = tx.active_connection()?;
    let result = build_query(sql, params).execute(conn).await?;
    Ok(result.rows_affected())
}
