//! # Handler Registry
//!
//! Startup-time registration table mapping a composite `(page_id, event_id)`
//! key to a handler factory, resolved per request.
//!
//! The set of routable handlers is statically known: handlers are registered
//! explicitly through [`RegistryBuilder`] before any request is served, and
//! ambiguous routing (a duplicate composite key) aborts the build. After
//! `build()` the registry is immutable and safe for unsynchronized concurrent
//! reads.
//!
//! A registration may use the wildcard event `"*"`, which matches any event
//! for its page, but only when the request supplies no explicit event.
//! Resolution never fails at runtime: an unknown key falls back to the
//! default handler.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{DispatchError, Result};
use crate::handler::ErasedHandler;

/// Event id sentinel matching any event when the request supplies none.
pub const WILDCARD_EVENT: &str = "*";

/// Constructs a handler instance for one dispatch.
pub type HandlerFactory = Box<dyn Fn() -> Arc<dyn ErasedHandler> + Send + Sync>;

/// Composite routing key for a handler registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub page_id: String,
    pub event_id: String,
}

impl RouteKey {
    pub fn new(page_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            event_id: event_id.into(),
        }
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.page_id, self.event_id)
    }
}

/// One registered routing entry: key plus handler factory.
pub struct HandlerDescriptor {
    key: RouteKey,
    factory: HandlerFactory,
}

impl HandlerDescriptor {
    pub fn key(&self) -> &RouteKey {
        &self.key
    }
}

/// Builder for the registry. Collects descriptors in registration order and
/// validates them at build time.
pub struct RegistryBuilder {
    descriptors: Vec<HandlerDescriptor>,
    default_factory: HandlerFactory,
}

impl RegistryBuilder {
    /// Start a builder with the default handler used when no registration
    /// matches a request.
    pub fn new<F>(default_factory: F) -> Self
    where
        F: Fn() -> Arc<dyn ErasedHandler> + Send + Sync + 'static,
    {
        Self {
            descriptors: Vec::new(),
            default_factory: Box::new(default_factory),
        }
    }

    /// Register a handler factory under a composite key.
    pub fn register<F>(mut self, page_id: &str, event_id: &str, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn ErasedHandler> + Send + Sync + 'static,
    {
        self.descriptors.push(HandlerDescriptor {
            key: RouteKey::new(page_id, event_id),
            factory: Box::new(factory),
        });
        self
    }

    /// Validate the collected registrations and freeze the registry.
    ///
    /// Fails fast on malformed metadata (empty page or event id) and on
    /// duplicate composite keys: ambiguous routing is a startup-time defect,
    /// not a runtime one.
    pub fn build(self) -> Result<HandlerRegistry> {
        let mut seen: HashSet<RouteKey> = HashSet::new();
        for descriptor in &self.descriptors {
            let key = descriptor.key();
            if key.page_id.is_empty() {
                return Err(DispatchError::malformed_routing(format!(
                    "empty page id in registration '{key}'"
                )));
            }
            if key.event_id.is_empty() {
                return Err(DispatchError::malformed_routing(format!(
                    "empty event id in registration '{key}'"
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(DispatchError::routing_ambiguity(
                    key.page_id.clone(),
                    key.event_id.clone(),
                ));
            }
        }

        info!(
            handlers = self.descriptors.len(),
            "Handler registry built"
        );
        Ok(HandlerRegistry {
            descriptors: self.descriptors,
            default_factory: self.default_factory,
        })
    }
}

/// Immutable mapping from `(page_id, event_id)` to handler factory.
pub struct HandlerRegistry {
    descriptors: Vec<HandlerDescriptor>,
    default_factory: HandlerFactory,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field(
                "keys",
                &self.descriptors.iter().map(|d| d.key()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl HandlerRegistry {
    /// Resolve a request to a handler instance.
    ///
    /// A missing page id resolves to the default handler immediately.
    /// Descriptors are scanned in registration order; an exact event match is
    /// required when the request supplies an event, and the wildcard is
    /// consulted only when it does not. No match resolves to the default
    /// handler, never an error.
    pub fn resolve(
        &self,
        page_id: Option<&str>,
        event_id: Option<&str>,
    ) -> Arc<dyn ErasedHandler> {
        let Some(page) = page_id else {
            debug!("No page id supplied; resolving to default handler");
            return (self.default_factory)();
        };

        for descriptor in &self.descriptors {
            let key = descriptor.key();
            if key.page_id != page {
                continue;
            }
            let matched = match event_id {
                Some(event) => key.event_id == event,
                None => key.event_id == WILDCARD_EVENT,
            };
            if matched {
                debug!(route = %key, "Resolved handler");
                return (descriptor.factory)();
            }
        }

        debug!(
            page_id = page,
            event_id = event_id.unwrap_or("<none>"),
            "No matching handler; resolving to default handler"
        );
        (self.default_factory)()
    }

    /// Registered descriptors, in registration order.
    pub fn descriptors(&self) -> &[HandlerDescriptor] {
        &self.descriptors
    }
}
