use std::collections::HashMap;

use axum::http::{HeaderMap, Uri};
use scholar_core::ServiceParams;

/// Everything the REST layer knows about a request.
#[derive(Debug, Clone, Default)]
pub struct RestParams {
    pub provider: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub method: String,
    pub path: String,
    pub raw_query: Option<String>,
}

impl RestParams {
    pub fn from_parts(
        provider: &str,
        headers: &HeaderMap,
        query: HashMap<String, String>,
        method: &str,
        uri: &Uri,
    ) -> Self {
        let headers = headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        Self {
            provider: provider.to_string(),
            headers,
            query,
            method: method.to_string(),
            path: uri.path().to_string(),
            raw_query: uri.query().map(str::to_string),
        }
    }
}

/// Converts REST request data into a service's params type.
pub trait FromRestParams: Sized {
    fn from_rest_params(params: RestParams) -> Self;
}

impl FromRestParams for RestParams {
    fn from_rest_params(params: RestParams) -> Self {
        params
    }
}

impl FromRestParams for () {
    fn from_rest_params(_params: RestParams) -> Self {}
}

// Headers stay at the edge; services only see the query string.
impl FromRestParams for ServiceParams {
    fn from_rest_params(params: RestParams) -> Self {
        ServiceParams {
            provider: params.provider,
            query: params.query,
        }
    }
}
