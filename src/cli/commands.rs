use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::cli::config::CrawlerConfig;
use crate::crawler::RunScheduler;
use crate::storage::StoreFactory;

/// Effective configuration: file (or defaults), then environment overrides
fn load_config(path: Option<&Path>) -> Result<CrawlerConfig> {
    let mut config = CrawlerConfig::load(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

/// Everything a crawl needs. Any failure here is fatal.
async fn start(path: Option<&Path>) -> Result<(Arc<BrowserSession>, RunScheduler)> {
    let config = load_config(path)?;
    config.validate()?;

    let store = StoreFactory::create(&config.storage).await
        .context("Failed to open the document store")?;
    let session = Arc::new(BrowserSession::start(&config.browser).await?);

    let scheduler = RunScheduler::new(session.clone(), store, config);
    Ok((session, scheduler))
}

async fn shutdown(session: Arc<BrowserSession>) {
    match Arc::try_unwrap(session) {
        Ok(session) => session.quit().await,
        Err(_) => warn!("Browser session still in use, leaving it to the WebDriver server"),
    }
}

/// Crawl forever until interrupted
pub async fn run(path: Option<&Path>) -> Result<()> {
    let (session, scheduler) = start(path).await?;

    tokio::select! {
        _ = scheduler.run_forever() => {},
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Interrupted, shutting down"),
                Err(e) => warn!("Failed to listen for interrupt: {}", e),
            }
        }
    }

    drop(scheduler);
    shutdown(session).await;

    Ok(())
}

/// A single run, then exit
pub async fn once(path: Option<&Path>) -> Result<()> {
    let (session, scheduler) = start(path).await?;

    let outcome = tokio::select! {
        result = scheduler.run_once(1) => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            None
        }
    };

    drop(scheduler);
    shutdown(session).await;

    if let Some(metrics) = outcome.transpose()? {
        println!(
            "Run finished: {} saved, {} failed, {} duplicates skipped over {} pages",
            metrics.saved, metrics.failed, metrics.duplicates_skipped, metrics.pages_visited
        );
    }

    Ok(())
}

/// Show the current configuration
pub fn show_config(path: Option<&Path>) -> Result<()> {
    let config = load_config(path)?;

    // connection strings usually carry credentials
    let mut shown = config.clone();
    if shown.storage.connection_string.is_some() {
        shown.storage.connection_string = Some("<redacted>".to_string());
    }

    println!("Current configuration:");
    println!("{}", serde_yaml::to_string(&shown).context("Failed to serialize configuration")?);

    if let Err(e) = config.validate() {
        warn!("Configuration is not usable yet: {}", e);
    }

    Ok(())
}

/// Write the built-in defaults to the default location
pub fn init_config() -> Result<()> {
    let path = CrawlerConfig::default_path();
    if path.exists() {
        anyhow::bail!("Configuration file already exists: {}", path.display());
    }

    let path = CrawlerConfig::default().save_as_default()?;
    println!("Created default configuration: {}", path.display());

    Ok(())
}
