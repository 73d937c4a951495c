//! Shared test doubles for integration tests: a recording transactional
//! resource and a pair of scripted handlers.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use pagekit_core::context::ExecutionContext;
use pagekit_core::error::{DispatchError, Result};
use pagekit_core::form::{BaseForm, FieldBindError, FormInput};
use pagekit_core::handler::Handler;
use pagekit_core::transaction::{ResourceProvider, TransactionManager, TransactionalResource};

/// Ordered record of everything the engine did to the transaction and the
/// handlers during a dispatch.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

pub struct RecordingResource {
    log: Arc<EventLog>,
}

#[async_trait]
impl TransactionalResource for RecordingResource {
    async fn commit(&mut self) -> Result<()> {
        self.log.push("tx.commit");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.log.push("tx.rollback");
        Ok(())
    }

    async fn dispose(self: Box<Self>) -> Result<()> {
        self.log.push("tx.dispose");
        Ok(())
    }

    fn connection(&mut self) -> Option<&mut sqlx::PgConnection> {
        None
    }
}

pub struct RecordingProvider {
    pub log: Arc<EventLog>,
}

#[async_trait]
impl ResourceProvider for RecordingProvider {
    async fn acquire(&self) -> Result<Box<dyn TransactionalResource>> {
        self.log.push("tx.begin");
        Ok(Box::new(RecordingResource {
            log: Arc::clone(&self.log),
        }))
    }
}

/// Input structure for the login handler.
#[derive(Debug, Default)]
pub struct LoginForm {
    pub base: BaseForm,
    pub user: String,
}

impl FormInput for LoginForm {
    fn apply_field(&mut self, name: &str, value: &str) -> std::result::Result<(), FieldBindError> {
        match name {
            "user" => {
                self.user = value.to_string();
                Ok(())
            }
            other => self.base.apply_field(other, value),
        }
    }
}

/// Non-read-only handler registered under (login, submit). Records its
/// execution with the bound user name; optionally fails with a scripted
/// database timeout.
pub struct LoginHandler {
    pub log: Arc<EventLog>,
    pub fail_with_timeout: bool,
}

#[async_trait]
impl Handler for LoginHandler {
    type Input = LoginForm;

    fn is_read_only(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        input: LoginForm,
        _ctx: &mut ExecutionContext,
        _tx: &mut TransactionManager,
    ) -> Result<()> {
        self.log.push(format!("login.execute user={}", input.user));
        if self.fail_with_timeout {
            return Err(DispatchError::database("database timeout"));
        }
        Ok(())
    }

    fn resolve_destination(&self) -> String {
        "/home".to_string()
    }

    async fn on_commit_completed(&self, _ctx: &mut ExecutionContext) {
        self.log.push("login.on_commit_completed");
    }
}

/// Read-only fallback handler used as the registry default.
pub struct DefaultHandler {
    pub log: Arc<EventLog>,
}

#[async_trait]
impl Handler for DefaultHandler {
    type Input = BaseForm;

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        _input: BaseForm,
        _ctx: &mut ExecutionContext,
        _tx: &mut TransactionManager,
    ) -> Result<()> {
        self.log.push("default.execute");
        Ok(())
    }

    fn resolve_destination(&self) -> String {
        "/welcome".to_string()
    }
}
