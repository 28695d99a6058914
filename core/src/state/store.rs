use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::Result;

/// Key/value document storage backing the conversation and user scopes.
///
/// Implementations must treat each key's document as opaque JSON. "Key not
/// present" is not an error: `read` simply omits it from the result.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, Value>>;
    async fn write(&self, changes: HashMap<String, Value>) -> Result<()>;
    async fn delete(&self, keys: &[String]) -> Result<()>;
}

/// In-process store for tests and single-host deployments.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn read(&self, keys: &[String]) -> Result<HashMap<String, Value>> {
        let documents = self.documents.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| documents.get(key).map(|doc| (key.clone(), doc.clone())))
            .collect())
    }

    async fn write(&self, changes: HashMap<String, Value>) -> Result<()> {
        let mut documents = self.documents.lock().await;
        documents.extend(changes);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        let mut documents = self.documents.lock().await;
        for key in keys {
            documents.remove(key);
        }
        Ok(())
    }
}
