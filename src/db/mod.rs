//! # Data Access Helpers
//!
//! Parameterized query execution against the request's active transaction.
//! All helpers fail with [`crate::error::DispatchError::NoActiveTransaction`]
//! when called outside `begin()`/`dispose()`.

pub mod query;

pub use query::{load_many, load_one, load_scalar_i64, update, SqlParam};
