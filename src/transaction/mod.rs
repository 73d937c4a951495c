//! # Transaction Lifecycle Management
//!
//! One transactional resource per in-flight request, with strict
//! begin -> execute -> commit|rollback -> dispose ordering.
//!
//! ## Architecture
//!
//! The [`TransactionManager`] is an explicit per-request value created by the
//! dispatch engine and passed down the call chain, never ambient global or
//! thread-local state, so ownership and lifetime stay visible and testable.
//! It drives a state machine per request:
//!
//! ```text
//! Absent -(begin)-> Active -(commit)-> Committed -(dispose)-> Absent
//!                   Active -(rollback)-> RolledBack -(dispose)-> Absent
//! ```
//!
//! Invariants:
//! - At most one `Active` handle per manager; `begin()` while a handle
//!   exists force-disposes the stale handle first.
//! - `commit()`/`rollback()` without a prior `begin()` is a programmer error
//!   ([`DispatchError::NoActiveTransaction`]).
//! - `dispose()` is idempotent and never raises; dispose failures are logged
//!   and discarded.
//!
//! The connection-equivalent resource sits behind the
//! [`TransactionalResource`] trait so the engine and its tests do not depend
//! on a live database; [`postgres`] provides the sqlx-backed implementation.

pub mod postgres;

use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::{debug, warn};

use crate::error::{DispatchError, Result};

pub use postgres::{PgResourceProvider, PgTransactionalResource};

/// Lifecycle state of the per-request transaction handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Absent,
    Active,
    Committed,
    RolledBack,
}

/// A connection-equivalent resource holding one open transaction.
///
/// Acquired already in-transaction (implicit auto-commit disabled, isolation
/// level applied) by a [`ResourceProvider`].
#[async_trait]
pub trait TransactionalResource: Send {
    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Release the underlying resource. Consumes the handle.
    async fn dispose(self: Box<Self>) -> Result<()>;

    /// The SQL connection backing this resource, when it has one.
    ///
    /// Query helpers execute against this; test doubles return `None`.
    fn connection(&mut self) -> Option<&mut PgConnection>;
}

/// Acquires transactional resources for the manager. One provider is shared
/// by all requests; each acquisition yields a resource owned by exactly one
/// request until disposal.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn TransactionalResource>>;
}

/// Per-request owner of the transaction handle.
pub struct TransactionManager {
    provider: std::sync::Arc<dyn ResourceProvider>,
    resource: Option<Box<dyn TransactionalResource>>,
    state: TxState,
    cleanup_error: Option<DispatchError>,
}

impl TransactionManager {
    pub fn new(provider: std::sync::Arc<dyn ResourceProvider>) -> Self {
        Self {
            provider,
            resource: None,
            state: TxState::Absent,
            cleanup_error: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// The most recent swallowed rollback or dispose failure, for
    /// diagnostics. Cleanup failures are never propagated; this is the only
    /// place they remain visible after being logged.
    pub fn last_cleanup_error(&self) -> Option<&DispatchError> {
        self.cleanup_error.as_ref()
    }

    /// Acquire a new transactional resource and enter `Active`.
    ///
    /// A handle left over from a previous begin is force-disposed first:
    /// a stale handle is a cleanup defect to repair, not a leak to ignore.
    pub async fn begin(&mut self) -> Result<()> {
        if self.resource.is_some() {
            if self.state == TxState::Active {
                warn!("begin() called while a transaction is active; disposing stale handle");
            }
            self.dispose().await;
        }

        let resource = self.provider.acquire().await?;
        self.resource = Some(resource);
        self.state = TxState::Active;
        debug!("Transaction begun");
        Ok(())
    }

    /// Commit the active transaction.
    ///
    /// On commit failure the handle stays `Active` so the caller can still
    /// attempt a rollback.
    pub async fn commit(&mut self) -> Result<()> {
        if self.state != TxState::Active {
            return Err(DispatchError::no_active_transaction("commit"));
        }
        let Some(resource) = self.resource.as_mut() else {
            return Err(DispatchError::no_active_transaction("commit"));
        };

        resource
            .commit()
            .await
            .map_err(|err| DispatchError::commit(err.to_string()))?;
        self.state = TxState::Committed;
        debug!("Transaction committed");
        Ok(())
    }

    /// Roll back the active transaction.
    ///
    /// A failure of the rollback itself is logged and swallowed: it occurs
    /// during error handling and must not mask the original failure. Calling
    /// without an active transaction is still a programmer error.
    pub async fn rollback(&mut self) -> Result<()> {
        if self.state != TxState::Active {
            return Err(DispatchError::no_active_transaction("rollback"));
        }
        let Some(resource) = self.resource.as_mut() else {
            return Err(DispatchError::no_active_transaction("rollback"));
        };

        if let Err(err) = resource.rollback().await {
            let err = DispatchError::rollback(err.to_string());
            warn!(error = %err, "Rollback failed; continuing error handling");
            self.cleanup_error = Some(err);
        }
        self.state = TxState::RolledBack;
        debug!("Transaction rolled back");
        Ok(())
    }

    /// Release the underlying resource and return to `Absent`.
    ///
    /// Idempotent and infallible from the caller's perspective; dispose
    /// failures are logged and discarded. No transactional resource may
    /// outlive its request.
    pub async fn dispose(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Err(err) = resource.dispose().await {
                let err = DispatchError::dispose(err.to_string());
                warn!(error = %err, "Failed to release transactional resource");
                self.cleanup_error = Some(err);
            }
        }
        self.state = TxState::Absent;
    }

    /// The SQL connection of the active transaction, for query helpers.
    pub fn active_connection(&mut self) -> Result<&mut PgConnection> {
        if self.state != TxState::Active {
            return Err(DispatchError::no_active_transaction("query execution"));
        }
        self.resource
            .as_mut()
            .and_then(|r| r.connection())
            .ok_or_else(|| {
                DispatchError::database("active transactional resource exposes no SQL connection")
            })
    }
}
