//! Request body validation.

use validator::{Validate, ValidationErrors};

use crate::error::GatehouseError;

/// Validate a request body, mapping failures to [`GatehouseError::Validation`].
pub fn validate_request<T: Validate>(body: &T) -> Result<(), GatehouseError> {
    body.validate().map_err(|e| GatehouseError::Validation {
        message: describe(&e),
    })
}

/// One `field: message` entry per failure, sorted by field name so the output is stable.
fn describe(errors: &ValidationErrors) -> String {
    let mut entries: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{field}: {message}"),
                None => format!("{field}: invalid value ({})", e.code),
            })
        })
        .collect();
    entries.sort();
    entries.join("; ")
}
