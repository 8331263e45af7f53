//! # Errors
//!
//! Structured portal errors. Each carries a status code plus a stable
//! `name` / `className` pair, rides inside `anyhow::Error` through the hook
//! pipeline and is serialized by the HTTP layer.

use std::fmt;

use anyhow::Error as AnyError;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    NotAuthenticated,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    Unprocessable,
    GeneralError,
    NotImplemented,
    BadGateway,
    Unavailable,
}

impl ErrorKind {
    /// `(status, name, className)`
    fn describe(&self) -> (u16, &'static str, &'static str) {
        match self {
            ErrorKind::BadRequest => (400, "BadRequest", "bad-request"),
            ErrorKind::NotAuthenticated => (401, "NotAuthenticated", "not-authenticated"),
            ErrorKind::Forbidden => (403, "Forbidden", "forbidden"),
            ErrorKind::NotFound => (404, "NotFound", "not-found"),
            ErrorKind::MethodNotAllowed => (405, "MethodNotAllowed", "method-not-allowed"),
            ErrorKind::Conflict => (409, "Conflict", "conflict"),
            ErrorKind::Unprocessable => (422, "Unprocessable", "unprocessable"),
            ErrorKind::GeneralError => (500, "GeneralError", "general-error"),
            ErrorKind::NotImplemented => (501, "NotImplemented", "not-implemented"),
            ErrorKind::BadGateway => (502, "BadGateway", "bad-gateway"),
            ErrorKind::Unavailable => (503, "Unavailable", "unavailable"),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.describe().0
    }

    pub fn name(&self) -> &'static str {
        self.describe().1
    }

    pub fn class_name(&self) -> &'static str {
        self.describe().2
    }
}

/// A portal error that can live inside `anyhow::Error`.
///
/// `errors` is usually a field-path → messages map from schema validation.
#[derive(Debug)]
pub struct ScholarError {
    pub kind: ErrorKind,
    pub message: String,
    pub errors: Option<Value>,
    pub source: Option<AnyError>,
}

macro_rules! constructors {
    ($($ctor:ident => $kind:ident),* $(,)?) => {
        $(
            pub fn $ctor(msg: impl Into<String>) -> Self {
                Self::new(ErrorKind::$kind, msg)
            }
        )*
    };
}

impl ScholarError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: None,
            source: None,
        }
    }

    constructors! {
        bad_request => BadRequest,
        not_authenticated => NotAuthenticated,
        forbidden => Forbidden,
        not_found => NotFound,
        method_not_allowed => MethodNotAllowed,
        conflict => Conflict,
        unprocessable => Unprocessable,
        general_error => GeneralError,
        not_implemented => NotImplemented,
        bad_gateway => BadGateway,
        unavailable => Unavailable,
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_source(mut self, source: AnyError) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn class_name(&self) -> &'static str {
        self.kind.class_name()
    }

    pub fn into_anyhow(self) -> AnyError {
        AnyError::new(self)
    }

    /// The first `ScholarError` in the chain of `err`.
    pub fn from_anyhow(err: &AnyError) -> Option<&ScholarError> {
        err.chain().find_map(|e| e.downcast_ref::<ScholarError>())
    }

    /// Structured errors pass through as-is; anything else becomes a
    /// `GeneralError` keeping the original as its source.
    pub fn normalize(err: AnyError) -> ScholarError {
        match err.downcast::<ScholarError>() {
            Ok(e) => e,
            Err(other) => ScholarError::general_error(other.to_string()).with_source(other),
        }
    }

    /// Same error without its source, safe to hand to clients.
    pub fn sanitize_for_client(&self) -> ScholarError {
        ScholarError {
            kind: self.kind,
            message: self.message.clone(),
            errors: self.errors.clone(),
            source: None,
        }
    }

    /// `{name, message, code, className, errors?}`
    pub fn to_json(&self) -> Value {
        let mut body = serde_json::json!({
            "name": self.name(),
            "message": self.message,
            "code": self.code(),
            "className": self.class_name(),
        });
        if let Some(errors) = &self.errors {
            body["errors"] = errors.clone();
        }
        body
    }
}

impl fmt::Display for ScholarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)
    }
}

impl std::error::Error for ScholarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
