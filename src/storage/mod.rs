pub mod document;
pub mod memory;
pub mod mongo;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::cli::config::StorageSettings;

// Re-export common types
pub use document::{DocumentStatus, VehicleDocument};
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Persistence for vehicle documents, keyed by canonical detail URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or update the document with this URL
    async fn upsert(&self, document: &VehicleDocument) -> Result<()>;
}

/// Factory for creating a DocumentStore implementation
pub struct StoreFactory;

impl StoreFactory {
    /// Create a new store based on the settings
    pub async fn create(settings: &StorageSettings) -> Result<Arc<dyn DocumentStore>> {
        match settings.storage_type.as_str() {
            "mongodb" => {
                let store = MongoStore::from_settings(settings).await?;
                Ok(Arc::new(store))
            },
            "memory" => {
                Ok(Arc::new(MemoryStore::new()))
            },
            _ => {
                anyhow::bail!("Unsupported storage type: {}", settings.storage_type);
            }
        }
    }
}
