use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{rows_of, QueryGateway};
use crate::query::{filter_pairs, select_pairs, Filter, Select};

#[derive(Clone, Debug)]
pub struct HttpGatewayOptions {
    /// Project URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    /// Public (anon) API key; sent as `apikey` and as the fallback bearer.
    pub anon_key: String,
    pub timeout: Duration,
}

impl HttpGatewayOptions {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`QueryGateway`] over a PostgREST-style REST API.
///
/// Requests carry the signed-in user's access token when one is set, so
/// the backend applies that user's row-level policy.
pub struct HttpGateway {
    client: Client,
    rest_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl HttpGateway {
    pub fn new(options: HttpGatewayOptions) -> GatewayResult<Self> {
        let base = options.base_url.trim_end_matches('/');
        if base.is_empty() {
            return Err(GatewayError::Invalid("gateway base url is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| GatewayError::Invalid(e.to_string()))?;

        Ok(Self {
            client,
            rest_url: format!("{base}/rest/v1"),
            anon_key: options.anon_key,
            access_token: RwLock::new(None),
        })
    }

    pub(crate) fn relation_url(&self, relation: &str) -> String {
        format!("{}/{}", self.rest_url, relation)
    }

    pub(crate) fn rpc_url(&self, function: &str) -> String {
        format!("{}/rpc/{}", self.rest_url, function)
    }

    pub(crate) fn auth_headers(&self) -> GatewayResult<HeaderMap> {
        let bearer = self
            .access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());

        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key).map_err(|e| GatewayError::Invalid(e.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {bearer}"))
                .map_err(|e| GatewayError::Invalid(e.to_string()))?,
        );
        Ok(headers)
    }

    fn request(&self, builder: RequestBuilder) -> GatewayResult<RequestBuilder> {
        Ok(builder.headers(self.auth_headers()?))
    }

    async fn send(&self, what: &str, builder: RequestBuilder) -> GatewayResult<Value> {
        let response = builder.send().await.map_err(|e| {
            warn!(request = what, error = %e, "gateway request failed");
            GatewayError::from(e)
        })?;
        decode_response(what, response).await
    }
}

async fn decode_response(what: &str, response: Response) -> GatewayResult<Value> {
    let status = response.status();
    let body = response.text().await?;
    debug!(request = what, status = status.as_u16(), "gateway response");

    if !status.is_success() {
        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.clone());
        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Err(GatewayError::Status {
            status: status.as_u16(),
            code,
            message,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn require_filters(op: &str, relation: &str, filters: &[Filter]) -> GatewayResult<()> {
    if filters.is_empty() {
        return Err(GatewayError::Invalid(format!(
            "refusing to {op} {relation} without filters"
        )));
    }
    Ok(())
}

#[async_trait]
impl QueryGateway for HttpGateway {
    async fn select(&self, query: &Select) -> GatewayResult<Vec<Value>> {
        let builder = self
            .client
            .get(self.relation_url(&query.relation))
            .query(&select_pairs(query));
        let value = self.send("select", self.request(builder)?).await?;
        Ok(rows_of(value))
    }

    async fn insert(&self, relation: &str, rows: Value) -> GatewayResult<Vec<Value>> {
        let builder = self
            .client
            .post(self.relation_url(relation))
            .header("Prefer", "return=representation")
            .json(&rows);
        let value = self.send("insert", self.request(builder)?).await?;
        Ok(rows_of(value))
    }

    async fn update(&self, relation: &str, filters: &[Filter], patch: Value) -> GatewayResult<Vec<Value>> {
        require_filters("update", relation, filters)?;
        let builder = self
            .client
            .patch(self.relation_url(relation))
            .query(&filter_pairs(filters))
            .header("Prefer", "return=representation")
            .json(&patch);
        let value = self.send("update", self.request(builder)?).await?;
        Ok(rows_of(value))
    }

    async fn delete(&self, relation: &str, filters: &[Filter]) -> GatewayResult<Vec<Value>> {
        require_filters("delete", relation, filters)?;
        let builder = self
            .client
            .delete(self.relation_url(relation))
            .query(&filter_pairs(filters))
            .header("Prefer", "return=representation");
        let value = self.send("delete", self.request(builder)?).await?;
        Ok(rows_of(value))
    }

    async fn upsert(&self, relation: &str, rows: Value, on_conflict: &[&str]) -> GatewayResult<Vec<Value>> {
        let mut builder = self
            .client
            .post(self.relation_url(relation))
            .header("Prefer", "return=representation,resolution=merge-duplicates")
            .json(&rows);
        if !on_conflict.is_empty() {
            builder = builder.query(&[("on_conflict", on_conflict.join(","))]);
        }
        let value = self.send("upsert", self.request(builder)?).await?;
        Ok(rows_of(value))
    }

    async fn rpc(&self, function: &str, args: Value) -> GatewayResult<Value> {
        let builder = self.client.post(self.rpc_url(function)).json(&args);
        self.send("rpc", self.request(builder)?).await
    }

    fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write() = token;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> HttpGateway {
        HttpGateway::new(HttpGatewayOptions::new("https://db.example.test/", "anon-key")).unwrap()
    }

    #[test]
    fn urls_are_built_under_rest_v1() {
        let gw = gateway();
        assert_eq!(gw.relation_url("classes"), "https://db.example.test/rest/v1/classes");
        assert_eq!(
            gw.rpc_url("is_super_admin"),
            "https://db.example.test/rest/v1/rpc/is_super_admin"
        );
    }

    #[test]
    fn bearer_falls_back_to_anon_key() {
        let gw = gateway();
        let headers = gw.auth_headers().unwrap();
        assert_eq!(headers.get("apikey").unwrap(), "anon-key");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer anon-key");

        gw.set_access_token(Some("user-token".to_string()));
        let headers = gw.auth_headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer user-token");
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(HttpGateway::new(HttpGatewayOptions::new("", "k")).is_err());
    }

    #[tokio::test]
    async fn unfiltered_delete_is_refused_locally() {
        let err = gateway().delete("classes", &[]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Invalid(_)));
    }
}
