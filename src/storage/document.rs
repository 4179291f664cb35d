use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Document};
use std::fmt;

use crate::cli::config::SiteProfile;
use crate::crawler::listing::DetailLink;
use crate::crawler::record::DetailRecord;

/// Outcome stored with every vehicle document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Ok,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Ok => "OK",
            DocumentStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One write for one detail URL. The URL is the identity (`_id`).
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDocument {
    pub url: String,
    pub localized_url: String,
    pub source: String,
    pub kind: String,
    pub status: DocumentStatus,
    /// Content fields; only written for OK documents
    pub record: Option<DetailRecord>,
    pub error: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl VehicleDocument {
    pub fn ok(link: &DetailLink, identity: &str, site: &SiteProfile, record: DetailRecord) -> Self {
        Self {
            url: identity.to_string(),
            localized_url: link.localized_url.clone(),
            source: site.source.clone(),
            kind: site.vehicle_type.clone(),
            status: DocumentStatus::Ok,
            record: Some(record),
            error: None,
            scraped_at: Utc::now(),
        }
    }

    pub fn failed(link: &DetailLink, identity: &str, site: &SiteProfile, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }

        Self {
            url: identity.to_string(),
            localized_url: link.localized_url.clone(),
            source: site.source.clone(),
            kind: site.vehicle_type.clone(),
            status: DocumentStatus::Failed,
            record: None,
            error: Some(error),
            scraped_at: Utc::now(),
        }
    }

    /// Lookup filter for this document's identity
    pub fn filter(&self) -> Document {
        doc! { "_id": &self.url }
    }

    /// Update document for an upsert.
    ///
    /// `createdAt` is only written on insert. A FAILED write leaves any
    /// content fields of an earlier OK write in place; an OK write clears a
    /// previous `error`.
    pub fn build_update(&self) -> Result<Document> {
        let now = bson::DateTime::from_millis(self.scraped_at.timestamp_millis());

        let mut set = doc! {
            "url": &self.url,
            "arUrl": &self.localized_url,
            "source": &self.source,
            "type": &self.kind,
            "status": self.status.as_str(),
            "updatedAt": now,
            "scrapedAt": now,
        };

        if let Some(record) = &self.record {
            let fields = bson::to_document(record)
                .context("Failed to convert DetailRecord to BSON document")?;
            for (key, value) in fields {
                set.insert(key, value);
            }
        }

        let mut update = doc! {
            "$setOnInsert": { "createdAt": now },
        };

        match (&self.status, &self.error) {
            (DocumentStatus::Failed, Some(error)) => {
                set.insert("error", error.as_str());
            }
            (DocumentStatus::Failed, None) => {
                set.insert("error", "unknown error");
            }
            (DocumentStatus::Ok, _) => {
                update.insert("$unset", doc! { "error": "" });
            }
        }

        update.insert("$set", set);
        Ok(update)
    }
}
