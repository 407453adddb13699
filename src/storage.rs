use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::types::WebhookEndpoint;

/// Persistence adapter for the endpoint catalog.
///
/// Saves are best-effort full-catalog snapshots; the registry never rolls
/// back in-memory state when one fails.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn load_endpoints(&self) -> Result<Vec<WebhookEndpoint>, StorageError>;
    async fn save_endpoints(&self, endpoints: &[WebhookEndpoint]) -> Result<(), StorageError>;
}

/// In-memory store for tests and lightweight deployments.
#[derive(Default)]
pub struct InMemoryStore {
    endpoints: Mutex<Vec<WebhookEndpoint>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for InMemoryStore {
    async fn load_endpoints(&self) -> Result<Vec<WebhookEndpoint>, StorageError> {
        Ok(self.endpoints.lock().await.clone())
    }

    async fn save_endpoints(&self, endpoints: &[WebhookEndpoint]) -> Result<(), StorageError> {
        *self.endpoints.lock().await = endpoints.to_vec();
        Ok(())
    }
}

/// Stores the catalog as a single JSON document on disk.
///
/// Writes go to a sibling temp file first, then rename over the target, so
/// a crash mid-save never truncates the catalog.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RegistryStore for JsonFileStore {
    async fn load_endpoints(&self) -> Result<Vec<WebhookEndpoint>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_endpoints(&self, endpoints: &[WebhookEndpoint]) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(endpoints)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
