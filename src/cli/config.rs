use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use tracing::{debug, info};

use crate::error::ScrapeError;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CrawlerConfig {
    pub browser: BrowserSettings,
    pub crawler: CrawlerSettings,
    pub timing: TimingSettings,
    pub site: SiteProfile,
    pub storage: StorageSettings,
}

/// WebDriver session settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BrowserSettings {
    /// Address of the WebDriver server (chromedriver, selenium, ...)
    pub webdriver_url: String,
    pub headless: bool,
    pub viewport: Viewport,
    /// Value passed to `--lang`
    pub language: String,
    pub page_load_timeout_secs: u64,
}

/// Browser viewport settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Run-level crawler settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CrawlerSettings {
    /// Overrides the listing template derived from the site profile
    pub start_url: Option<String>,
    /// Safety cap on listing pages per run
    pub max_pages: u32,
    /// Pause between two runs, in hours
    pub sleep_hours: u64,
    /// Delay after each stored item in milliseconds
    pub politeness_delay: u64,
    /// Store the full rendered document alongside the record
    pub capture_html: bool,
}

/// Polling intervals and timeouts used while waiting on rendered pages
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TimingSettings {
    pub list_ready_timeout_secs: u64,
    pub list_poll_ms: u64,
    /// Pause after navigation before the first listing poll
    pub list_settle_ms: u64,
    pub detail_ready_timeout_secs: u64,
    pub detail_poll_ms: u64,
    /// Pause once the detail page reports ready, before the scroll sweep
    pub detail_settle_ms: u64,
    /// Vertical offsets visited to force lazy sections to render
    pub scroll_sweep: Vec<i64>,
    pub scroll_step_ms: u64,
    pub expand_timeout_secs: u64,
    pub expand_poll_ms: u64,
}

/// Selectors and conventions of the crawled site
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SiteProfile {
    pub origin: String,
    /// Locale path segment inserted after the origin, e.g. `ar`
    pub locale: String,
    pub result_anchor_selector: String,
    /// Heading selectors in priority order; the first with text wins
    pub title_selectors: Vec<String>,
    /// Breadcrumb container selectors in priority order
    pub breadcrumb_selectors: Vec<String>,
    pub highlights_selector: String,
    pub measurements_selector: String,
    pub spec_label_selector: String,
    pub spec_value_selector: String,
    pub description_selector: String,
    pub feature_chip_selector: String,
    pub expand_control_selector: String,
    /// Visible text of the fallback "show more" button
    pub show_more_text: String,
    /// Path segment shared by every vehicle photo
    pub image_bucket: String,
    /// Markers of the curated main/gallery renditions inside the bucket
    pub curated_image_markers: Vec<String>,
    pub thumbnail_marker: String,
    pub currency: String,
    /// Value of the `source` field of stored documents
    pub source: String,
    /// Value of the `type` field of stored documents
    pub vehicle_type: String,
}

/// Document store settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct StorageSettings {
    pub storage_type: String, // "mongodb", "memory"
    pub connection_string: Option<String>,
    pub database_name: Option<String>,
    pub collection_name: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            viewport: Viewport {
                width: 1366,
                height: 900,
            },
            language: "ar".to_string(),
            page_load_timeout_secs: 60,
        }
    }
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            start_url: None,
            max_pages: 50,
            sleep_hours: 48,
            politeness_delay: 250,
            capture_html: false,
        }
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            list_ready_timeout_secs: 45,
            list_poll_ms: 500,
            list_settle_ms: 1000,
            detail_ready_timeout_secs: 35,
            detail_poll_ms: 400,
            detail_settle_ms: 1200,
            scroll_sweep: vec![0, 400, 900, 1400, 2000],
            scroll_step_ms: 250,
            expand_timeout_secs: 12,
            expand_poll_ms: 350,
        }
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            origin: "https://ksa.yallamotor.com".to_string(),
            locale: "ar".to_string(),
            result_anchor_selector: r"a.hover\:text-main[href^='/new-cars/']".to_string(),
            title_selectors: vec![
                "#overview-panel h1".to_string(),
                "h1".to_string(),
            ],
            breadcrumb_selectors: vec![
                "nav[aria-label='Breadcrumb']".to_string(),
                "nav.breadcrumbs".to_string(),
            ],
            highlights_selector: "div[role='list'][aria-labelledby='vehicle-highlights']".to_string(),
            measurements_selector: "div[role='list'][aria-label='Vehicle measurements']".to_string(),
            spec_label_selector: ".text-sm".to_string(),
            spec_value_selector: ".text-base".to_string(),
            description_selector: "div[data-slot='card-content'].prose .line-clamp-3".to_string(),
            feature_chip_selector: "span.text-base.capitalize[title]".to_string(),
            expand_control_selector: "button[aria-label='الميزات']".to_string(),
            show_more_text: "عرض المزيد".to_string(),
            image_bucket: "/resized/car_model/".to_string(),
            curated_image_markers: vec![
                "webp_listing_main".to_string(),
                "webp_slide_show".to_string(),
            ],
            thumbnail_marker: "webp_thumb".to_string(),
            currency: "SAR".to_string(),
            source: "yallamotor".to_string(),
            vehicle_type: "NEW_CAR".to_string(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            storage_type: "mongodb".to_string(),
            connection_string: None,
            database_name: None,
            collection_name: "yalla_new_cars".to_string(),
        }
    }
}

impl SiteProfile {
    /// First listing page of the site, used when no start URL is configured
    pub fn default_listing_url(&self) -> String {
        format!(
            "{}/{}/new-cars/search?page=1",
            self.origin.trim_end_matches('/'),
            self.locale
        )
    }
}

/// Interpret a `HEADLESS`-style flag. Only explicit "off" spellings disable it.
pub fn parse_headless(value: &str) -> bool {
    !matches!(value.trim(), "0" | "false" | "False")
}

impl CrawlerConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "carlot-crawler", "carlot-crawler") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        }
    }

    /// Location of the default configuration file
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("default.yaml")
    }

    /// Load configuration from `path`, or from the default location when it
    /// exists, or fall back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        let default_path = Self::default_path();
        if default_path.exists() {
            Self::load_from_file(&default_path)
        } else {
            debug!("No configuration file at {}, using defaults", default_path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))
    }

    fn from_yaml(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        Ok(config)
    }

    /// Save the configuration as the default
    pub fn save_as_default(&self) -> Result<PathBuf> {
        let path = Self::default_path();
        self.save_to_file(&path)?;
        info!("Wrote default configuration to {}", path.display());
        Ok(path)
    }

    /// Save the configuration to a file
    fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Apply the environment variables the deployment sets on top of the file
    /// configuration. `lookup` is normally `std::env::var(..).ok()`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(value) = non_empty("HEADLESS") {
            self.browser.headless = parse_headless(&value);
        }
        if let Some(value) = non_empty("WEBDRIVER_URL") {
            self.browser.webdriver_url = value;
        }
        if let Some(value) = non_empty("START_URL") {
            self.crawler.start_url = Some(value);
        }
        if let Some(value) = non_empty("MAX_PAGES") {
            self.crawler.max_pages = value.parse()
                .context(format!("MAX_PAGES must be a positive integer, got {:?}", value))?;
        }
        if let Some(value) = non_empty("SLEEP_HOURS") {
            self.crawler.sleep_hours = value.parse()
                .context(format!("SLEEP_HOURS must be a whole number of hours, got {:?}", value))?;
        }
        if let Some(value) = non_empty("MONGO_URL") {
            self.storage.connection_string = Some(value);
        }
        if let Some(value) = non_empty("MONGO_DB") {
            self.storage.database_name = Some(value);
        }
        if let Some(value) = non_empty("MONGO_COLLECTION") {
            self.storage.collection_name = value;
        }

        Ok(())
    }

    /// Check the settings that startup cannot do without
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.storage.storage_type == "mongodb" {
            let missing = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
            if missing(&self.storage.connection_string) {
                return Err(ScrapeError::MissingConfig { key: "MONGO_URL" });
            }
            if missing(&self.storage.database_name) {
                return Err(ScrapeError::MissingConfig { key: "MONGO_DB" });
            }
        }
        if self.crawler.max_pages == 0 {
            return Err(ScrapeError::MissingConfig { key: "MAX_PAGES" });
        }
        Ok(())
    }

    /// Listing URL template for page 1
    pub fn start_url(&self) -> String {
        self.crawler.start_url.clone()
            .unwrap_or_else(|| self.site.default_listing_url())
    }
}
