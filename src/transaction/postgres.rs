//! PostgreSQL-backed transactional resource.
//!
//! Opens one dedicated connection per request (no pooling) and starts an
//! explicit transaction on acquisition, which disables implicit auto-commit
//! for the lifetime of the handle.

use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use tracing::{debug, warn};

use super::{ResourceProvider, TransactionalResource};
use crate::error::Result;

/// Acquires one [`PgTransactionalResource`] per request.
pub struct PgResourceProvider {
    database_url: String,
}

impl PgResourceProvider {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

#[async_trait]
impl ResourceProvider for PgResourceProvider {
    async fn acquire(&self) -> Result<Box<dyn TransactionalResource>> {
        let mut conn = PgConnection::connect(&self.database_url).await?;

        // Read committed is the preferred isolation level; fall back to
        // serializable when the server refuses it.
        if let Err(err) = sqlx::query("BEGIN ISOLATION LEVEL READ COMMITTED")
            .execute(&mut conn)
            .await
        {
            warn!(
                error = %err,
                "Read-committed isolation unsupported; falling back to serializable"
            );
            sqlx::query("BEGIN ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut conn)
                .await?;
        }

        debug!("Acquired transactional connection");
        Ok(Box::new(PgTransactionalResource { conn }))
    }
}

/// One open PostgreSQL connection holding one open transaction.
pub struct PgTransactionalResource {
    conn: PgConnection,
}

#[async_trait]
impl TransactionalResource for PgTransactionalResource {
    async fn commit(&mut self) -> Result<()> {
        sqlx::query("COMMIT").execute(&mut self.conn).await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        sqlx::query("ROLLBACK").execute(&mut self.conn).await?;
        Ok(())
    }

    async fn dispose(self: Box<Self>) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }

    fn connection(&mut self) -> Option<&mut PgConnection> {
        Some(&mut self.conn)
    }
}
