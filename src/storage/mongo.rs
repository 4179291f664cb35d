use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, UpdateOptions};
use mongodb::{Client, Collection};
use tracing::{debug, info};

use crate::cli::config::StorageSettings;
use crate::error::ScrapeError;
use crate::storage::document::VehicleDocument;
use crate::storage::DocumentStore;

/// MongoDB implementation of DocumentStore
pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect and ping the server, so a bad connection string fails at startup
    pub async fn connect(connection_string: &str, database_name: &str, collection_name: &str) -> Result<Self> {
        // Parse connection options
        let mut client_options = ClientOptions::parse(connection_string)
            .await
            .context("Failed to parse MongoDB connection string")?;
        client_options.app_name = Some("carlot-crawler".to_string());

        // Create the client
        let client = Client::with_options(client_options)
            .context("Failed to create MongoDB client")?;

        let database = client.database(database_name);

        // Test connection
        database.run_command(doc! { "ping": 1 }, None)
            .await
            .context("Failed to connect to MongoDB")?;

        info!(database = database_name, collection = collection_name, "Connected to MongoDB");

        Ok(Self {
            collection: database.collection(collection_name),
        })
    }

    /// Connect using the storage section of the config
    pub async fn from_settings(settings: &StorageSettings) -> Result<Self> {
        let connection_string = settings.connection_string.as_deref()
            .ok_or(ScrapeError::MissingConfig { key: "MONGO_URL" })?;
        let database_name = settings.database_name.as_deref()
            .ok_or(ScrapeError::MissingConfig { key: "MONGO_DB" })?;

        Self::connect(connection_string, database_name, &settings.collection_name).await
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn upsert(&self, document: &VehicleDocument) -> Result<()> {
        let update = document.build_update()?;

        self.collection
            .update_one(document.filter(), update, UpdateOptions::builder().upsert(true).build())
            .await
            .with_context(|| format!("Failed to upsert document for {}", document.url))?;

        debug!(url = %document.url, status = %document.status, "Upserted vehicle document");

        Ok(())
    }
}
