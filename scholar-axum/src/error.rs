use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scholar_core::errors::ScholarError;
use scholar_tenancy::{ScopeError, StorageError};
use tracing::warn;

#[derive(Debug)]
pub struct ScholarAxumError(pub anyhow::Error);

impl From<anyhow::Error> for ScholarAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<ScholarError> for ScholarAxumError {
    fn from(e: ScholarError) -> Self {
        Self(e.into_anyhow())
    }
}

impl From<ScopeError> for ScholarAxumError {
    fn from(e: ScopeError) -> Self {
        ScholarError::from(e).into()
    }
}

impl From<StorageError> for ScholarAxumError {
    fn from(e: StorageError) -> Self {
        ScholarError::from(e).into()
    }
}

fn respond(err: &ScholarError) -> Response {
    let safe = err.sanitize_for_client();
    let status = StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(safe.to_json())).into_response()
}

impl IntoResponse for ScholarAxumError {
    fn into_response(self) -> Response {
        // ScholarErrors keep their shape even under anyhow context layers.
        if let Some(err) = ScholarError::from_anyhow(&self.0) {
            if err.code() >= 500 {
                warn!(code = err.code(), error = %err, "request failed");
            }
            return respond(err);
        }

        warn!(error = %self.0, "unstructured error reached the http edge");
        respond(&ScholarError::general_error(self.0.to_string()))
    }
}
