//! # Handler Contract
//!
//! A handler is the routable unit of request processing: it declares whether
//! it only reads the database, executes against the bound input inside the
//! request's transaction, and names the destination to forward to.
//!
//! Handlers declare a concrete [`FormInput`] type; the [`ErasedHandler`]
//! wrapper hides it so the registry can hold heterogeneous handlers behind
//! one object-safe surface. Handlers are constructed per dispatch by their
//! descriptor factory, so they need no shared mutable state; implementations
//! must stay safe for that construction pattern (stateless or internally
//! synchronized).

use std::any::Any;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::{DispatchError, Result};
use crate::form::{self, FormInput, RawParams};
use crate::transaction::TransactionManager;

/// A routable unit of request-processing logic.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// The typed input structure request parameters bind into.
    type Input: FormInput;

    /// Whether this handler only reads the database. Read-only handlers are
    /// never committed or rolled back.
    fn is_read_only(&self) -> bool;

    /// Process the request against the bound input, inside the request's
    /// transaction.
    async fn execute(
        &self,
        input: Self::Input,
        ctx: &mut ExecutionContext,
        tx: &mut TransactionManager,
    ) -> Result<()>;

    /// Logical destination to forward to after a successful dispatch.
    fn resolve_destination(&self) -> String;

    /// Commit completion notification. Default: no-op.
    async fn on_commit_completed(&self, _ctx: &mut ExecutionContext) {}
}

/// Input bound for a specific handler, with its concrete type erased.
///
/// Produced by [`ErasedHandler::bind_input`] and consumed by
/// [`ErasedHandler::execute`] of the same handler.
pub struct BoundInput(Box<dyn Any + Send>);

/// Object-safe view of a [`Handler`], used by the registry and the engine.
#[async_trait]
pub trait ErasedHandler: Send + Sync {
    fn is_read_only(&self) -> bool;

    fn resolve_destination(&self) -> String;

    /// Construct this handler's input type and bind the raw parameters into
    /// it. Per-field failures are logged and skipped; binding never fails.
    fn bind_input(&self, raw_params: &RawParams) -> BoundInput;

    /// Execute against input previously produced by `bind_input`.
    async fn execute(
        &self,
        input: BoundInput,
        ctx: &mut ExecutionContext,
        tx: &mut TransactionManager,
    ) -> Result<()>;

    async fn on_commit_completed(&self, ctx: &mut ExecutionContext);
}

#[async_trait]
impl<H: Handler> ErasedHandler for H {
    fn is_read_only(&self) -> bool {
        Handler::is_read_only(self)
    }

    fn resolve_destination(&self) -> String {
        Handler::resolve_destination(self)
    }

    fn bind_input(&self, raw_params: &RawParams) -> BoundInput {
        BoundInput(Box::new(form::bind::<H::Input>(raw_params)))
    }

    async fn execute(
        &self,
        input: BoundInput,
        ctx: &mut ExecutionContext,
        tx: &mut TransactionManager,
    ) -> Result<()> {
        let input = input.0.downcast::<H::Input>().map_err(|_| {
            DispatchError::handler_execution("bound input does not match the handler's input type")
        })?;
        Handler::execute(self, *input, ctx, tx).await
    }

    async fn on_commit_completed(&self, ctx: &mut ExecutionContext) {
        Handler::on_commit_completed(self, ctx).await;
    }
}
