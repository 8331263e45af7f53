//! scholar-schema: payload validation for Scholar services.
//!
//! Schemas are plain `serde` + `validator` structs. [`validate`] parses a
//! JSON payload into one and maps failures to an `Unprocessable` error with
//! a field-path → messages map; [`SchemaHook`] runs that check as a
//! before hook on create/update/patch.

mod errors;
mod hook;
mod validate;

pub use errors::{schema_error, unprocessable, SchemaErrors};
pub use hook::SchemaHook;
pub use validate::{validate, validate_into_value};
