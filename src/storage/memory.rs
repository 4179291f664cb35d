use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::storage::document::VehicleDocument;
use crate::storage::DocumentStore;

/// In-process store with the same upsert semantics as the MongoDB one.
/// Used for dry runs (`storage_type: memory`) and tests.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryStore {
    pub async fn get(&self, url: &str) -> Option<Document> {
        self.documents.lock().await.get(url).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }
}

/// Apply a `$setOnInsert`/`$set`/`$unset` update to `existing`, or to a
/// fresh document with `_id = id` when there is none
fn apply_update(existing: Option<Document>, id: &str, update: &Document) -> Document {
    let inserting = existing.is_none();
    let mut target = existing.unwrap_or_else(|| {
        let mut fresh = Document::new();
        fresh.insert("_id", id);
        fresh
    });

    if inserting {
        if let Ok(on_insert) = update.get_document("$setOnInsert") {
            for (key, value) in on_insert {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    if let Ok(set) = update.get_document("$set") {
        for (key, value) in set {
            target.insert(key.clone(), value.clone());
        }
    }

    if let Ok(unset) = update.get_document("$unset") {
        for key in unset.keys() {
            target.remove(key);
        }
    }

    target
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, document: &VehicleDocument) -> Result<()> {
        let update = document.build_update()
            .with_context(|| format!("Failed to build update for {}", document.url))?;

        let mut documents = self.documents.lock().await;
        let existing = documents.remove(&document.url);
        let stored = apply_update(existing, &document.url, &update);

        debug!(
            url = %document.url,
            status = ?stored.get("status").and_then(Bson::as_str),
            "Stored vehicle document in memory"
        );
        documents.insert(document.url.clone(), stored);

        Ok(())
    }
}
