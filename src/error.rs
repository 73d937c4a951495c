//! # Dispatch Error Types
//!
//! Structured error handling for the dispatch core using thiserror.
//!
//! The taxonomy mirrors the lifecycle of a dispatch: routing problems are
//! startup-fatal, transaction-ordering violations are programmer errors, and
//! handler/commit failures are the only errors that reach the caller-visible
//! error path. Rollback and dispose failures are logged and discarded by the
//! components that detect them.

use thiserror::Error;

/// Crate-wide error type for the dispatch engine and its collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Duplicate (page_id, event_id) registration discovered at registry
    /// build time. The process must not start with ambiguous routing.
    #[error("ambiguous routing: duplicate registration for page '{page_id}', event '{event_id}'")]
    RoutingAmbiguity { page_id: String, event_id: String },

    /// Routing metadata that cannot be registered (empty ids, missing default).
    #[error("malformed routing metadata: {message}")]
    MalformedRouting { message: String },

    /// commit/rollback/query called without a prior begin(). A framework
    /// invariant violation, not a runtime condition.
    #[error("no active transaction: {operation} requires a prior begin()")]
    NoActiveTransaction { operation: String },

    /// Any error raised by a handler's execute body.
    #[error("handler execution failed: {message}")]
    HandlerExecution { message: String },

    /// Commit failed after a successful execute. Treated identically to a
    /// handler execution failure: rollback attempt plus error routing.
    #[error("transaction commit failed: {message}")]
    Commit { message: String },

    /// Rollback failed. Never escalated past the transaction manager.
    #[error("transaction rollback failed: {message}")]
    Rollback { message: String },

    /// Releasing the transactional resource failed. Never escalated.
    #[error("transactional resource dispose failed: {message}")]
    Dispose { message: String },

    /// Computing the error destination failed while already handling a
    /// primary failure.
    #[error("error routing failed: {message}")]
    ErrorRouting { message: String },

    /// Data-access error from the underlying driver.
    #[error("database error: {message}")]
    Database { message: String },

    /// Configuration loading or validation error.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl DispatchError {
    /// Create a routing ambiguity error for a duplicate composite key
    pub fn routing_ambiguity(page_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self::RoutingAmbiguity {
            page_id: page_id.into(),
            event_id: event_id.into(),
        }
    }

    /// Create a malformed routing metadata error
    pub fn malformed_routing(message: impl Into<String>) -> Self {
        Self::MalformedRouting {
            message: message.into(),
        }
    }

    /// Create a no-active-transaction error naming the offending operation
    pub fn no_active_transaction(operation: impl Into<String>) -> Self {
        Self::NoActiveTransaction {
            operation: operation.into(),
        }
    }

    /// Create a handler execution error
    pub fn handler_execution(message: impl Into<String>) -> Self {
        Self::HandlerExecution {
            message: message.into(),
        }
    }

    /// Create a commit error
    pub fn commit(message: impl Into<String>) -> Self {
        Self::Commit {
            message: message.into(),
        }
    }

    /// Create a rollback error
    pub fn rollback(message: impl Into<String>) -> Self {
        Self::Rollback {
            message: message.into(),
        }
    }

    /// Create a dispose error
    pub fn dispose(message: impl Into<String>) -> Self {
        Self::Dispose {
            message: message.into(),
        }
    }

    /// Create an error routing error
    pub fn error_routing(message: impl Into<String>) -> Self {
        Self::ErrorRouting {
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error belongs to the caller-visible error path.
    ///
    /// Only handler execution and commit failures surface to the caller;
    /// everything else is contained by the component that detects it.
    pub fn is_caller_visible(&self) -> bool {
        matches!(self, Self::HandlerExecution { .. } | Self::Commit { .. })
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;
