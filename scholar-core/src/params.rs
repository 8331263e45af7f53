use std::collections::HashMap;

/// Transport-neutral call parameters handed to services and hooks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceParams {
    /// Where the call came from (`"rest"`, `"internal"`).
    pub provider: String,
    pub query: HashMap<String, String>,
}

impl ServiceParams {
    pub fn internal() -> Self {
        Self {
            provider: "internal".to_string(),
            query: HashMap::new(),
        }
    }

    pub fn with_query<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query.insert(key.into(), value.into());
        self
    }

    /// A non-empty query value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// `?limit=` as a positive number; anything else is ignored.
    pub fn limit(&self) -> Option<usize> {
        self.get("limit")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
    }
}
