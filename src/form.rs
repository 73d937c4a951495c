//! # Form Input Binding
//!
//! Populates a handler's typed input structure from raw request parameters.
//!
//! Each input type implements [`FormInput`] with an explicit field-binding
//! function (a hand-written mapping from parameter name to field setter)
//! so the set of bindable fields is statically known. Binding is tolerant:
//! a parameter that fails to bind (unknown name, unparseable value) is
//! logged and skipped, and binding of the remaining parameters continues.
//! Binding never aborts the request.

use thiserror::Error;
use tracing::warn;

/// Raw request parameters in arrival order. Duplicate names are allowed;
/// the last value for a name wins.
pub type RawParams = [(String, String)];

/// Per-field binding failure. Contained within the binder, never surfaced
/// to the caller of a dispatch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldBindError {
    #[error("no field accepts this parameter")]
    UnknownField,

    #[error("invalid value: {message}")]
    InvalidValue { message: String },
}

impl FieldBindError {
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue {
            message: message.into(),
        }
    }
}

/// A typed input structure that request parameters bind into.
///
/// Implementations start from their `Default` value; fields with no
/// corresponding parameter keep it.
pub trait FormInput: Default + Send + 'static {
    /// Bind one named parameter into the matching field.
    fn apply_field(&mut self, name: &str, value: &str) -> Result<(), FieldBindError>;
}

/// Routing-key fields every form carries. Embed and delegate to it from the
/// fallthrough arm of [`FormInput::apply_field`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BaseForm {
    pub page_id: String,
    pub event_id: String,
}

impl FormInput for BaseForm {
    fn apply_field(&mut self, name: &str, value: &str) -> Result<(), FieldBindError> {
        match name {
            "page_id" => {
                self.page_id = value.to_string();
                Ok(())
            }
            "event_id" => {
                self.event_id = value.to_string();
                Ok(())
            }
            _ => Err(FieldBindError::UnknownField),
        }
    }
}

/// Construct a zero-valued `F` and bind every raw parameter into it.
///
/// Individual binding failures are logged at `warn` and skipped.
pub fn bind<F: FormInput>(raw_params: &RawParams) -> F {
    let mut form = F::default();
    for (name, value) in raw_params {
        if let Err(err) = form.apply_field(name, value) {
            warn!(
                parameter = %name,
                error = %err,
                "Skipping request parameter that failed to bind"
            );
        }
    }
    form
}
