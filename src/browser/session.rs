use anyhow::{Result, Context};
use async_trait::async_trait;
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::WindowHandle;
use tracing::{debug, error, info};

use crate::browser::context::{BrowserEngine, Evaluation, PageContext};
use crate::cli::config::BrowserSettings;

/// WebDriver-backed browser. One session; every browsing context is a tab
/// of that session.
pub struct BrowserSession {
    driver: WebDriver,
    /// Window the session started with; stays open so the session survives
    /// closing every tab.
    home: WindowHandle,
}

impl BrowserSession {
    /// Start a WebDriver session. Failure here is fatal for the process.
    pub async fn start(config: &BrowserSettings) -> Result<Self> {
        info!(headless = config.headless, webdriver = %config.webdriver_url, "Starting browser session");

        let mut caps = DesiredCapabilities::chrome();

        caps.add_chrome_arg(&format!("--lang={}", config.language))?;
        caps.add_chrome_arg(&format!("--window-size={},{}", config.viewport.width, config.viewport.height))?;

        if config.headless {
            caps.set_headless()?;
        }

        caps.add_chrome_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_chrome_arg("--disable-dev-shm-usage")?;

        let driver = WebDriver::new(&config.webdriver_url, caps).await
            .context(format!("Failed to connect to WebDriver at {}", config.webdriver_url))?;

        driver.set_page_load_timeout(Duration::from_secs(config.page_load_timeout_secs)).await
            .context("Failed to set page load timeout")?;

        let home = driver.window().await
            .context("Failed to read the initial window handle")?;

        debug!("Browser session started");

        Ok(Self { driver, home })
    }

    /// End the WebDriver session
    pub async fn quit(self) {
        if let Err(e) = self.driver.quit().await {
            error!("Error closing browser session: {}", e);
        }
        debug!("Browser session closed");
    }
}

#[async_trait]
impl BrowserEngine for BrowserSession {
    async fn open_context(&self) -> Result<Box<dyn PageContext>> {
        self.driver.switch_to_window(self.home.clone()).await
            .context("Failed to focus the session window")?;

        let handle = self.driver.new_tab().await
            .context("Failed to open a new tab")?;

        let tab = BrowserTab {
            driver: self.driver.clone(),
            handle,
            home: self.home.clone(),
        };
        tab.focus().await?;
        tab.driver.goto("about:blank").await
            .context("Failed to load blank page in new tab")?;

        Ok(Box::new(tab))
    }
}

/// A tab of the shared session. Every call focuses the tab first because
/// WebDriver commands always target the current window.
struct BrowserTab {
    driver: WebDriver,
    handle: WindowHandle,
    home: WindowHandle,
}

impl BrowserTab {
    async fn focus(&self) -> Result<()> {
        self.driver.switch_to_window(self.handle.clone()).await
            .context("Failed to switch to browsing context")?;
        Ok(())
    }
}

#[async_trait]
impl PageContext for BrowserTab {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.focus().await?;

        debug!("Navigating to: {}", url);
        self.driver.goto(url).await
            .context(format!("Failed to navigate to URL: {}", url))?;

        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Evaluation {
        if let Err(e) = self.focus().await {
            return Evaluation::Failed(format!("{:#}", e));
        }

        match self.driver.execute(script, Vec::new()).await {
            Ok(ret) => Evaluation::from_json(ret.json().clone()),
            Err(e) => {
                debug!("Script evaluation failed: {}", e);
                Evaluation::Failed(e.to_string())
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.focus().await?;
        self.driver.close_window().await
            .context("Failed to close browsing context")?;
        self.driver.switch_to_window(self.home.clone()).await
            .context("Failed to return to the session window")?;
        Ok(())
    }
}
