//! # Configuration
//!
//! A string key/value store, mirroring `app.set()` / `app.get()`.
//!
//! ```rust
//! use scholar_core::ScholarApp;
//! let app = ScholarApp::<(), ()>::new();
//!
//! app.set("http.port", "3030");
//! assert_eq!(app.get("http.port"), Some("3030".to_string()));
//! ```
//!
//! ## Environment overrides
//!
//! [`ScholarConfig::load_env`] folds prefixed environment variables into
//! the store: `SCHOLAR__GATEWAY__URL` becomes `gateway.url`.
//!
//! ```bash
//! export SCHOLAR__TENANCY__MULTIPLE_ASSIGNMENTS=most_recent
//! ```

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct ScholarConfig {
    values: HashMap<String, String>,
}

impl ScholarConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Seed from `(key, value)` pairs, typically the application defaults.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut cfg = Self::new();
        for (k, v) in pairs {
            cfg.set(k, v);
        }
        cfg
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Apply overrides from the process environment.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(prefix, std::env::vars())
    }

    /// Apply overrides from an explicit variable list; returns how many
    /// keys were set.
    pub fn load_vars<I>(&mut self, prefix: &str, vars: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut applied = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if normalized.is_empty() {
                    continue;
                }
                self.set(normalized, value);
                applied += 1;
            }
        }
        applied
    }

    pub fn snapshot(&self) -> ScholarConfigSnapshot {
        ScholarConfigSnapshot::new(self.values.clone())
    }
}

/// Immutable copy handed to hooks and services.
#[derive(Debug, Clone, Default)]
pub struct ScholarConfigSnapshot {
    map: HashMap<String, String>,
}

impl ScholarConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_u16(&self, key: &str) -> Option<u16> {
        self.get(key).and_then(|v| v.trim().parse::<u16>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse::<bool>().ok())
    }
}
