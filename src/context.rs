//! # Execution Context
//!
//! Per-request scratch space for handlers. Each dispatch gets a fresh
//! [`ExecutionContext`] holding a request-scoped attribute map (dropped with
//! the request) and a handle to a session-scoped attribute store shared
//! across requests of the same session.
//!
//! Attributes are addressable by an explicit string key or, for convenience,
//! by the value's type name as implicit key, the idiom handlers use to hand
//! a single well-known value to the destination view.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Well-known attribute keys used by the dispatch engine.
pub mod attr_keys {
    /// Key under which the engine records the triggering error of a failed
    /// dispatch before routing to the error destination.
    pub const ERROR: &str = "error";
}

type AttrValue = Arc<dyn Any + Send + Sync>;

/// Session-scoped attribute store, shared across the requests of one session.
///
/// Cloning is cheap; clones observe the same underlying map.
#[derive(Clone, Default)]
pub struct SessionStore {
    attrs: Arc<RwLock<HashMap<String, AttrValue>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<AttrValue> {
        self.attrs.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.attrs.write().insert(key.into(), Arc::new(value));
    }

    pub fn remove(&self, key: &str) -> Option<AttrValue> {
        self.attrs.write().remove(key)
    }
}

/// Per-request execution context.
///
/// Created by the embedding server for each inbound request and destroyed
/// when the request completes; request-scoped attributes never outlive it.
pub struct ExecutionContext {
    request_attrs: HashMap<String, AttrValue>,
    session: SessionStore,
    started_at: DateTime<Utc>,
}

impl ExecutionContext {
    /// Create a context bound to the given session store.
    pub fn new(session: SessionStore) -> Self {
        Self {
            request_attrs: HashMap::new(),
            session,
            started_at: Utc::now(),
        }
    }

    /// Create a context with a private, empty session store. Test convenience.
    pub fn detached() -> Self {
        Self::new(SessionStore::new())
    }

    /// Get a request-scoped attribute by key.
    pub fn attr(&self, key: &str) -> Option<AttrValue> {
        self.request_attrs.get(key).cloned()
    }

    /// Get a request-scoped attribute downcast to a concrete type.
    pub fn attr_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.attr(key).and_then(|v| v.downcast::<T>().ok())
    }

    /// Set a request-scoped attribute under an explicit key.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.request_attrs.insert(key.into(), Arc::new(value));
    }

    /// Set a request-scoped attribute keyed by the value's type name.
    pub fn set_attr_typed<T: Any + Send + Sync>(&mut self, value: T) {
        self.request_attrs
            .insert(short_type_name::<T>().to_string(), Arc::new(value));
    }

    /// Get a request-scoped attribute stored under its type name.
    pub fn attr_typed<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.attr_as::<T>(short_type_name::<T>())
    }

    /// Get a session-scoped attribute by key.
    pub fn session_attr(&self, key: &str) -> Option<AttrValue> {
        self.session.get(key)
    }

    /// Get a session-scoped attribute downcast to a concrete type.
    pub fn session_attr_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.session.get(key).and_then(|v| v.downcast::<T>().ok())
    }

    /// Set a session-scoped attribute under an explicit key.
    pub fn set_session_attr(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.session.set(key, value);
    }

    /// Set a session-scoped attribute keyed by the value's type name.
    pub fn set_session_attr_typed<T: Any + Send + Sync>(&self, value: T) {
        self.session.set(short_type_name::<T>(), value);
    }

    /// Remove a session-scoped attribute.
    pub fn remove_session_attr(&self, key: &str) {
        self.session.remove(key);
    }

    /// The session store backing this context.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// When this request's context was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Unqualified type name, used as the implicit attribute key.
///
/// Strips module paths up to the last `::` outside angle brackets, so a
/// generic type keeps its outer name intact. Inner type arguments stay
/// fully qualified; the key only has to be stable and readable.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let bytes = full.as_bytes();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' | b'[' => depth += 1,
            b'>' | b')' | b']' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                start = i + 2;
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    &full[start..]
}
