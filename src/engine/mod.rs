//! # Dispatch Engine
//!
//! Per-request orchestrator: resolves the handler for a composite
//! `(page_id, event_id)` key, binds raw parameters into the handler's input
//! structure, and runs the handler inside a single database transaction with
//! commit/rollback/dispose guarantees.
//!
//! ## Pipeline
//!
//! ```text
//! resolve -> bind -> begin -> execute -> commit -> on_commit_completed -> destination
//!                                     \-> rollback -> error destination
//! ```
//!
//! Failure semantics:
//! - Any error from binding construction, execute, or commit is a dispatch
//!   failure: rollback is attempted (unless the handler is read-only), the
//!   error is recorded into the context under [`attr_keys::ERROR`], and the
//!   request is routed to the error destination.
//! - Read-only handlers are never committed or rolled back; their handle is
//!   still disposed.
//! - The transaction handle is disposed on every path. No transactional
//!   resource outlives its request.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::{attr_keys, ExecutionContext};
use crate::error::{DispatchError, Result};
use crate::form::RawParams;
use crate::handler::{BoundInput, ErasedHandler};
use crate::registry::HandlerRegistry;
use crate::transaction::{ResourceProvider, TransactionManager};

/// Chooses the destination for a failed dispatch. External collaborator seam;
/// most deployments use [`FixedErrorRouter`].
pub trait ErrorRouter: Send + Sync {
    fn error_destination(&self, error: &DispatchError, ctx: &ExecutionContext) -> Result<String>;
}

/// Routes every failure to one configured destination.
pub struct FixedErrorRouter {
    destination: String,
}

impl FixedErrorRouter {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
        }
    }
}

impl ErrorRouter for FixedErrorRouter {
    fn error_destination(&self, _error: &DispatchError, _ctx: &ExecutionContext) -> Result<String> {
        Ok(self.destination.clone())
    }
}

/// Result of one dispatch, carrying the logical destination the embedding
/// server should forward to.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Success {
        destination: String,
    },
    /// `destination` is `None` only when computing the error destination
    /// itself failed; the request then terminates without forwarding.
    Failure {
        destination: Option<String>,
    },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Success { destination } => Some(destination),
            Self::Failure { destination } => destination.as_deref(),
        }
    }
}

/// The per-request dispatch orchestrator. One engine is shared by all
/// requests; each `handle` call owns its own transaction manager.
pub struct DispatchEngine {
    registry: Arc<HandlerRegistry>,
    provider: Arc<dyn ResourceProvider>,
    error_router: Arc<dyn ErrorRouter>,
}

impl DispatchEngine {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        provider: Arc<dyn ResourceProvider>,
        error_router: Arc<dyn ErrorRouter>,
    ) -> Self {
        Self {
            registry,
            provider,
            error_router,
        }
    }

    /// Dispatch one request end to end.
    pub async fn handle(
        &self,
        page_id: Option<&str>,
        event_id: Option<&str>,
        raw_params: &RawParams,
        ctx: &mut ExecutionContext,
    ) -> DispatchOutcome {
        let request_id = Uuid::new_v4();
        debug!(
            %request_id,
            page_id = page_id.unwrap_or("<none>"),
            event_id = event_id.unwrap_or("<none>"),
            "Dispatching request"
        );

        let handler = self.registry.resolve(page_id, event_id);
        let input = handler.bind_input(raw_params);

        let mut tx = TransactionManager::new(Arc::clone(&self.provider));
        let result = self
            .run_transaction(handler.as_ref(), input, ctx, &mut tx)
            .await;
        // Non-negotiable: the handle is disposed on every path.
        tx.dispose().await;

        match result {
            Ok(destination) => {
                let elapsed_ms = (chrono::Utc::now() - ctx.started_at()).num_milliseconds();
                info!(%request_id, destination = %destination, elapsed_ms, "Dispatch succeeded");
                DispatchOutcome::Success { destination }
            }
            Err(err) => self.route_error(request_id, err, ctx),
        }
    }

    /// Execute the handler inside the request transaction and return the
    /// success destination. Every error path has already rolled back (where
    /// applicable) by the time this returns.
    async fn run_transaction(
        &self,
        handler: &dyn ErasedHandler,
        input: BoundInput,
        ctx: &mut ExecutionContext,
        tx: &mut TransactionManager,
    ) -> Result<String> {
        tx.begin().await?;

        if let Err(err) = handler.execute(input, ctx, tx).await {
            self.rollback_quietly(handler, tx).await;
            return Err(err);
        }

        if !handler.is_read_only() {
            if let Err(err) = tx.commit().await {
                self.rollback_quietly(handler, tx).await;
                return Err(err);
            }
            handler.on_commit_completed(ctx).await;
        }

        Ok(handler.resolve_destination())
    }

    /// Best-effort rollback during error handling. Read-only handlers have no
    /// transaction side effects to undo, so neither commit nor rollback is
    /// ever issued for them.
    async fn rollback_quietly(&self, handler: &dyn ErasedHandler, tx: &mut TransactionManager) {
        if handler.is_read_only() {
            return;
        }
        if let Err(err) = tx.rollback().await {
            warn!(error = %err, "Rollback attempt failed during error handling");
        }
    }

    /// Record the failure into the context and choose the error destination.
    fn route_error(
        &self,
        request_id: Uuid,
        err: DispatchError,
        ctx: &mut ExecutionContext,
    ) -> DispatchOutcome {
        error!(%request_id, error = %err, "Dispatch failed");
        ctx.set_attr(attr_keys::ERROR, err.clone());

        match self.error_router.error_destination(&err, ctx) {
            Ok(destination) => DispatchOutcome::Failure {
                destination: Some(destination),
            },
            Err(routing_err) => {
                // Secondary failure: log it and terminate the request without
                // a destination rather than crashing the worker.
                error!(
                    %request_id,
                    error = %routing_err,
                    "Failed to compute error destination"
                );
                DispatchOutcome::Failure { destination: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::BaseForm;
    use crate::handler::Handler;
    use crate::registry::RegistryBuilder;
    use crate::transaction::{TransactionalResource, TxState};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct TxLog {
        events: Mutex<Vec<String>>,
    }

    impl TxLog {
        fn push(&self, event: &str) {
            self.events.lock().push(event.to_string());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    struct LoggedResource {
        log: Arc<TxLog>,
        fail_commit: bool,
    }

    #[async_trait]
    impl TransactionalResource for LoggedResource {
        async fn commit(&mut self) -> Result<()> {
            self.log.push("commit");
            if self.fail_commit {
                return Err(DispatchError::database("commit refused"));
            }
            Ok(())
        }

        async fn rollback(&mut self) -> Result<()> {
            self.log.push("rollback");
            Ok(())
        }

        async fn dispose(self: Box<Self>) -> Result<()> {
            self.log.push("dispose");
            Ok(())
        }

        fn connection(&mut self) -> Option<&mut sqlx::PgConnection> {
            None
        }
    }

    struct LoggedProvider {
        log: Arc<TxLog>,
        fail_commit: bool,
    }

    #[async_trait]
    impl ResourceProvider for LoggedProvider {
        async fn acquire(&self) -> Result<Box<dyn TransactionalResource>> {
            self.log.push("begin");
            Ok(Box::new(LoggedResource {
                log: Arc::clone(&self.log),
                fail_commit: self.fail_commit,
            }))
        }
    }

    struct ScriptedHandler {
        read_only: bool,
        fail_execute: bool,
        log: Arc<TxLog>,
    }

    #[async_trait]
    impl Handler for ScriptedHandler {
        type Input = BaseForm;

        fn is_read_only(&self) -> bool {
            self.read_only
        }

        async fn execute(
            &self,
            input: BaseForm,
            ctx: &mut ExecutionContext,
            tx: &mut TransactionManager,
        ) -> Result<()> {
            assert_eq!(tx.state(), TxState::Active);
            self.log.push("execute");
            ctx.set_attr("bound_page", input.page_id);
            if self.fail_execute {
                return Err(DispatchError::handler_execution("scripted failure"));
            }
            Ok(())
        }

        fn resolve_destination(&self) -> String {
            "/home".to_string()
        }

        async fn on_commit_completed(&self, _ctx: &mut ExecutionContext) {
            self.log.push("on_commit_completed");
        }
    }

    fn engine(
        log: &Arc<TxLog>,
        read_only: bool,
        fail_execute: bool,
        fail_commit: bool,
    ) -> DispatchEngine {
        let handler_log = Arc::clone(log);
        let registry = RegistryBuilder::new({
            let log = Arc::clone(log);
            move || {
                Arc::new(ScriptedHandler {
                    read_only: true,
                    fail_execute: false,
                    log: Arc::clone(&log),
                }) as Arc<dyn ErasedHandler>
            }
        })
        .register("page", "event", move || {
            Arc::new(ScriptedHandler {
                read_only,
                fail_execute,
                log: Arc::clone(&handler_log),
            }) as Arc<dyn ErasedHandler>
        })
        .build()
        .unwrap();

        DispatchEngine::new(
            Arc::new(registry),
            Arc::new(LoggedProvider {
                log: Arc::clone(log),
                fail_commit,
            }),
            Arc::new(FixedErrorRouter::new("/error")),
        )
    }

    fn params() -> Vec<(String, String)> {
        vec![("page_id".to_string(), "page".to_string())]
    }

    #[tokio::test]
    async fn successful_write_dispatch_commits_then_notifies() {
        let log = Arc::new(TxLog::default());
        let engine = engine(&log, false, false, false);
        let mut ctx = ExecutionContext::detached();

        let outcome = engine
            .handle(Some("page"), Some("event"), &params(), &mut ctx)
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Success {
                destination: "/home".to_string()
            }
        );
        assert_eq!(
            log.events(),
            ["begin", "execute", "commit", "on_commit_completed", "dispose"]
        );
        assert_eq!(*ctx.attr_as::<String>("bound_page").unwrap(), "page");
    }

    #[tokio::test]
    async fn failed_write_dispatch_rolls_back_and_routes_to_error() {
        let log = Arc::new(TxLog::default());
        let engine = engine(&log, false, true, false);
        let mut ctx = ExecutionContext::detached();

        let outcome = engine
            .handle(Some("page"), Some("event"), &params(), &mut ctx)
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Failure {
                destination: Some("/error".to_string())
            }
        );
        // Rolled back exactly once, never committed, never notified.
        assert_eq!(log.events(), ["begin", "execute", "rollback", "dispose"]);

        let recorded = ctx.attr_as::<DispatchError>(attr_keys::ERROR).unwrap();
        assert!(matches!(*recorded, DispatchError::HandlerExecution { .. }));
    }

    #[tokio::test]
    async fn failed_read_only_dispatch_touches_no_transaction() {
        let log = Arc::new(TxLog::default());
        let engine = engine(&log, true, true, false);
        let mut ctx = ExecutionContext::detached();

        let outcome = engine
            .handle(Some("page"), Some("event"), &params(), &mut ctx)
            .await;

        assert!(!outcome.is_success());
        // Neither commit nor rollback for read-only handlers; dispose always.
        assert_eq!(log.events(), ["begin", "execute", "dispose"]);
    }

    #[tokio::test]
    async fn successful_read_only_dispatch_skips_commit_and_notification() {
        let log = Arc::new(TxLog::default());
        let engine = engine(&log, true, false, false);
        let mut ctx = ExecutionContext::detached();

        let outcome = engine
            .handle(Some("page"), Some("event"), &params(), &mut ctx)
            .await;

        assert!(outcome.is_success());
        assert_eq!(log.events(), ["begin", "execute", "dispose"]);
    }

    #[tokio::test]
    async fn commit_failure_is_treated_as_dispatch_failure() {
        let log = Arc::new(TxLog::default());
        let engine = engine(&log, false, false, true);
        let mut ctx = ExecutionContext::detached();

        let outcome = engine
            .handle(Some("page"), Some("event"), &params(), &mut ctx)
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Failure {
                destination: Some("/error".to_string())
            }
        );
        assert_eq!(log.events(), ["begin", "execute", "commit", "rollback", "dispose"]);

        let recorded = ctx.attr_as::<DispatchError>(attr_keys::ERROR).unwrap();
        assert!(matches!(*recorded, DispatchError::Commit { .. }));
    }

    #[tokio::test]
    async fn unmatched_key_falls_back_to_default_handler() {
        let log = Arc::new(TxLog::default());
        let engine = engine(&log, false, false, false);
        let mut ctx = ExecutionContext::detached();

        let outcome = engine
            .handle(Some("page"), Some("unregistered"), &params(), &mut ctx)
            .await;

        // Default handler is read-only: no commit, no notification.
        assert!(outcome.is_success());
        assert_eq!(log.events(), ["begin", "execute", "dispose"]);
    }

    struct FailingRouter;

    impl ErrorRouter for FailingRouter {
        fn error_destination(
            &self,
            _error: &DispatchError,
            _ctx: &ExecutionContext,
        ) -> Result<String> {
            Err(DispatchError::error_routing("router unavailable"))
        }
    }

    #[tokio::test]
    async fn secondary_routing_failure_terminates_without_destination() {
        let log = Arc::new(TxLog::default());
        let handler_log = Arc::clone(&log);
        let registry = RegistryBuilder::new({
            let log = Arc::clone(&log);
            move || {
                Arc::new(ScriptedHandler {
                    read_only: true,
                    fail_execute: false,
                    log: Arc::clone(&log),
                }) as Arc<dyn ErasedHandler>
            }
        })
        .register("page", "event", move || {
            Arc::new(ScriptedHandler {
                read_only: false,
                fail_execute: true,
                log: Arc::clone(&handler_log),
            }) as Arc<dyn ErasedHandler>
        })
        .build()
        .unwrap();

        let engine = DispatchEngine::new(
            Arc::new(registry),
            Arc::new(LoggedProvider {
                log: Arc::clone(&log),
                fail_commit: false,
            }),
            Arc::new(FailingRouter),
        );

        let mut ctx = ExecutionContext::detached();
        let outcome = engine
            .handle(Some("page"), Some("event"), &params(), &mut ctx)
            .await;

        assert_eq!(outcome, DispatchOutcome::Failure { destination: None });
        // The handle is still disposed after the secondary failure.
        assert_eq!(log.events(), ["begin", "execute", "rollback", "dispose"]);
    }
}
