use std::sync::Arc;

use parking_lot::RwLock;
use scholar_gateway::{QueryGateway, QueryGatewayExt, Select};
use tracing::{debug, warn};

use crate::models::School;
use crate::storage::{DurableStorage, StorageError};

/// Storage key of the selection.
pub const CURRENT_SCHOOL_KEY: &str = "currentSchoolId";
pub const SCHOOLS: &str = "schools";

/// The school the operator is working in.
///
/// Advisory: it only defaults the school of school-scoped operations and
/// never grants access. Writes go through to durable storage.
pub struct CurrentSchoolStore {
    storage: Arc<dyn DurableStorage>,
    gateway: Arc<dyn QueryGateway>,
    current: RwLock<Option<String>>,
}

impl CurrentSchoolStore {
    pub fn new(storage: Arc<dyn DurableStorage>, gateway: Arc<dyn QueryGateway>) -> Self {
        Self {
            storage,
            gateway,
            current: RwLock::new(None),
        }
    }

    /// Load the persisted selection, falling back to the default school.
    ///
    /// A failing lookup is logged and leaves the selection empty.
    pub async fn initialize(&self) -> Option<String> {
        let persisted = self.storage.get(CURRENT_SCHOOL_KEY).unwrap_or_else(|e| {
            warn!(error = %e, "could not read persisted school selection");
            None
        });

        let selected = match persisted {
            Some(id) => {
                debug!(school_id = %id, "restored school selection");
                Some(id)
            }
            None => self.default_school().await.map(|school| {
                if let Err(e) = self.storage.set(CURRENT_SCHOOL_KEY, &school.id) {
                    warn!(error = %e, "could not persist default school");
                }
                school.id
            }),
        };

        *self.current.write() = selected.clone();
        selected
    }

    async fn default_school(&self) -> Option<School> {
        let query = Select::from(SCHOOLS).eq("is_default", true);
        match self.gateway.select_maybe_single(&query).await {
            Ok(Some(row)) => match serde_json::from_value::<School>(row) {
                Ok(school) => Some(school),
                Err(e) => {
                    warn!(error = %e, "default school row did not decode");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "default school lookup failed");
                None
            }
        }
    }

    pub fn current_school_id(&self) -> Option<String> {
        self.current.read().clone()
    }

    /// Select a school, or clear the selection with `None`.
    ///
    /// Memory is updated even when persisting fails; the error is returned
    /// so the caller can report it.
    pub fn set_current_school_id(&self, school_id: Option<String>) -> Result<(), StorageError> {
        *self.current.write() = school_id.clone();
        match school_id {
            Some(id) => self.storage.set(CURRENT_SCHOOL_KEY, &id),
            None => self.storage.remove(CURRENT_SCHOOL_KEY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use scholar_gateway::MemoryGateway;
    use serde_json::json;

    #[tokio::test]
    async fn persisted_value_wins_over_default() {
        let gw = Arc::new(MemoryGateway::new().with_rows(
            SCHOOLS,
            vec![json!({"id": "s-default", "name": "Main", "is_default": true})],
        ));
        let storage = Arc::new(MemoryStorage::new().with_value(CURRENT_SCHOOL_KEY, "s-saved"));
        let store = CurrentSchoolStore::new(storage, gw.clone());

        assert_eq!(store.initialize().await.as_deref(), Some("s-saved"));
        assert_eq!(gw.call_count(), 0);
    }

    #[tokio::test]
    async fn default_school_is_adopted_and_persisted() {
        let gw = Arc::new(MemoryGateway::new().with_rows(
            SCHOOLS,
            vec![
                json!({"id": "s1", "name": "North", "is_default": false}),
                json!({"id": "s2", "name": "Main", "is_default": true}),
            ],
        ));
        let storage = Arc::new(MemoryStorage::new());
        let store = CurrentSchoolStore::new(storage.clone(), gw);

        assert_eq!(store.initialize().await.as_deref(), Some("s2"));
        assert_eq!(storage.get(CURRENT_SCHOOL_KEY).unwrap().as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn failing_lookup_leaves_selection_empty() {
        let gw = Arc::new(MemoryGateway::new());
        gw.fail_relation(SCHOOLS, "offline");
        let store = CurrentSchoolStore::new(Arc::new(MemoryStorage::new()), gw);

        assert_eq!(store.initialize().await, None);
        assert_eq!(store.current_school_id(), None);
    }
}
