use scholar_core::errors::ScholarError;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The request never produced a backend answer (network, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("backend rejected request ({status}): {message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("could not decode backend response: {0}")]
    Decode(String),

    #[error("no rows returned from {relation}")]
    NoRows { relation: String },

    #[error("expected a single row from {relation}, got {count}")]
    MultipleRows { relation: String, count: usize },

    #[error("unknown rpc: {0}")]
    UnknownRpc(String),

    #[error("invalid request: {0}")]
    Invalid(String),
}

impl GatewayError {
    /// True when the call itself failed, as opposed to the backend
    /// answering with something unexpected.
    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

impl From<GatewayError> for ScholarError {
    fn from(err: GatewayError) -> Self {
        let message = err.to_string();
        let base = match &err {
            GatewayError::Transport(_) => ScholarError::unavailable(message),
            GatewayError::Status { status, .. } => match status {
                400 => ScholarError::bad_request(message),
                401 => ScholarError::not_authenticated(message),
                403 => ScholarError::forbidden(message),
                404 => ScholarError::not_found(message),
                409 => ScholarError::conflict(message),
                422 => ScholarError::unprocessable(message),
                _ => ScholarError::bad_gateway(message),
            },
            GatewayError::Decode(_) => ScholarError::bad_gateway(message),
            GatewayError::NoRows { .. } => ScholarError::not_found(message),
            GatewayError::MultipleRows { .. } => ScholarError::conflict(message),
            GatewayError::UnknownRpc(_) => ScholarError::not_implemented(message),
            GatewayError::Invalid(_) => ScholarError::bad_request(message),
        };
        base.with_source(anyhow::Error::new(err))
    }
}

impl GatewayError {
    pub fn into_anyhow(self) -> anyhow::Error {
        ScholarError::from(self).into_anyhow()
    }
}
