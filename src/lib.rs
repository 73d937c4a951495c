#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Pagekit Core
//!
//! Minimal server-side MVC dispatch core: routes requests to handlers by a
//! composite `(page_id, event_id)` key, binds raw parameters into typed
//! input structures, and wraps handler execution in a single database
//! transaction with commit/rollback/dispose guarantees.
//!
//! ## Architecture
//!
//! One dispatch flows through four components:
//!
//! ```text
//! request -> HandlerRegistry (resolve) -> InputBinder (bind)
//!         -> TransactionManager (begin/commit|rollback/dispose)
//!         -> handler.execute -> destination decision
//! ```
//!
//! - [`registry`]: startup-time registration table from composite key to
//!   handler factory, with wildcard-event fallback and a default handler
//! - [`form`]: tolerant per-field binding of raw parameters into each
//!   handler's typed input
//! - [`transaction`]: one connection-equivalent resource per request with
//!   strict begin -> commit|rollback -> dispose ordering
//! - [`engine`]: the per-request orchestrator tying the above together
//! - [`db`]: parameterized query helpers executing against the request's
//!   active transaction
//! - [`context`]: request- and session-scoped attribute storage handlers
//!   share with their destination views
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pagekit_core::config::ConfigManager;
//! use pagekit_core::engine::{DispatchEngine, FixedErrorRouter};
//! use pagekit_core::registry::RegistryBuilder;
//! use pagekit_core::transaction::PgResourceProvider;
//!
//! # fn handlers() -> RegistryBuilder { unimplemented!() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! pagekit_core::logging::init_structured_logging();
//!
//! let config = ConfigManager::load()?;
//! let registry = handlers().build()?;
//! let engine = DispatchEngine::new(
//!     Arc::new(registry),
//!     Arc::new(PgResourceProvider::new(config.config().database.connection_url())),
//!     Arc::new(FixedErrorRouter::new(config.config().dispatch.error_destination.clone())),
//! );
//! # let _ = engine;
//! # Ok(())
//! # }
//! ```
//!
//! The outer network listener that decodes requests and forwards to the
//! returned destination is the embedding server's concern; this crate ends
//! at the [`engine::DispatchOutcome`].

pub mod config;
pub mod context;
pub mod db;
pub mod engine;
pub mod error;
pub mod form;
pub mod handler;
pub mod logging;
pub mod registry;
pub mod transaction;
pub mod util;

pub use config::{ConfigManager, DatabaseConfig, DispatchConfig, PagekitConfig};
pub use context::{ExecutionContext, SessionStore};
pub use engine::{DispatchEngine, DispatchOutcome, ErrorRouter, FixedErrorRouter};
pub use error::{DispatchError, Result};
pub use form::{BaseForm, FieldBindError, FormInput};
pub use handler::{ErasedHandler, Handler};
pub use registry::{HandlerRegistry, RegistryBuilder, RouteKey, WILDCARD_EVENT};
pub use transaction::{
    PgResourceProvider, ResourceProvider, TransactionManager, TransactionalResource, TxState,
};
