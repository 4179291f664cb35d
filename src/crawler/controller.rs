use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::context::{BrowserEngine, PageContext};
use crate::cli::config::CrawlerConfig;
use crate::crawler::detail::scrape_detail;
use crate::crawler::listing::{collect_links, resolve_links, DetailLink, ListingPageRef};
use crate::crawler::tracker::{normalize_url, RunState};
use crate::storage::{DocumentStatus, DocumentStore, VehicleDocument};
use crate::utils::RunMetrics;

/// Error stored for a detail page that rendered but yielded nothing usable
pub const EMPTY_EXTRACTION: &str = "detail page yielded no extractable fields";

/// The two phases of the endless crawl loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Sleeping(Duration),
}

/// Repeats full passes over the listing pages with a long pause in between
pub struct RunScheduler {
    engine: Arc<dyn BrowserEngine>,
    store: Arc<dyn DocumentStore>,
    config: CrawlerConfig,
}

impl RunScheduler {
    pub fn new(engine: Arc<dyn BrowserEngine>, store: Arc<dyn DocumentStore>, config: CrawlerConfig) -> Self {
        Self { engine, store, config }
    }

    /// Pause between the end of one run and the start of the next
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_secs(self.config.crawler.sleep_hours.saturating_mul(3600))
    }

    /// Alternate between running and sleeping until the future is dropped.
    /// A failed run is logged and followed by the usual sleep.
    pub async fn run_forever(&self) {
        let mut state = SchedulerState::Running;
        let mut run_number = 0u64;

        loop {
            state = match state {
                SchedulerState::Running => {
                    run_number += 1;
                    if let Err(err) = self.run_once(run_number).await {
                        error!(run = run_number, "Run failed: {:#}", err);
                    }
                    SchedulerState::Sleeping(self.sleep_interval())
                }
                SchedulerState::Sleeping(duration) => {
                    info!(run = run_number, hours = duration.as_secs() / 3600, "Sleeping until next run");
                    sleep(duration).await;
                    SchedulerState::Running
                }
            };
        }
    }

    /// One pass over the listing pages.
    ///
    /// Opens a listing and a detail context, and closes both on every exit
    /// path. Item failures become FAILED documents; only failures that stop
    /// the whole pass (context or listing navigation) are returned.
    pub async fn run_once(&self, run_number: u64) -> Result<RunMetrics> {
        info!(run = run_number, start_url = %self.config.start_url(), "Starting run");

        let mut state = RunState::new(run_number);
        let mut metrics = RunMetrics::new(run_number);
        let timer = metrics.start_timer();

        let listing = self.engine.open_context().await
            .context("Failed to open listing context")?;
        let detail = match self.engine.open_context().await {
            Ok(detail) => detail,
            Err(err) => {
                release(listing.as_ref(), "listing").await;
                return Err(err.context("Failed to open detail context"));
            }
        };

        let result = self.crawl_pages(listing.as_ref(), detail.as_ref(), &mut state, &mut metrics).await;

        release(detail.as_ref(), "detail").await;
        release(listing.as_ref(), "listing").await;

        metrics.finish(&timer);
        metrics.log_summary();

        result.map(|_| metrics)
    }

    async fn crawl_pages(
        &self,
        listing: &dyn PageContext,
        detail: &dyn PageContext,
        state: &mut RunState,
        metrics: &mut RunMetrics,
    ) -> Result<()> {
        let site = &self.config.site;
        let template = self.config.start_url();

        for page_number in 1..=self.config.crawler.max_pages {
            let page_url = ListingPageRef::new(template.as_str(), page_number).url();
            info!(run = state.run_number, page = page_number, url = %page_url, "Visiting listing page");

            listing.navigate(&page_url).await
                .with_context(|| format!("Failed to load listing page {}", page_url))?;

            let hrefs = match collect_links(listing, &page_url, site, &self.config.timing).await {
                Ok(hrefs) => hrefs,
                Err(err) => {
                    info!(run = state.run_number, page = page_number, "Ending run: {}", err);
                    metrics.ended_early = true;
                    break;
                }
            };
            metrics.pages_visited += 1;

            let links = resolve_links(&hrefs, site);
            if links.is_empty() {
                info!(run = state.run_number, page = page_number, "Listing page has no detail links, ending run");
                metrics.ended_early = true;
                break;
            }
            metrics.links_found += links.len();
            debug!(page = page_number, count = links.len(), "Resolved detail links");

            for link in &links {
                let identity = normalize_url(&link.absolute_url);
                if !state.first_sighting(&identity) {
                    debug!(href = %link.href, "Duplicate detail link");
                    metrics.duplicates_skipped += 1;
                    continue;
                }

                self.process_item(detail, link, &identity, metrics).await;
                sleep(Duration::from_millis(self.config.crawler.politeness_delay)).await;
            }
        }

        debug!(run = state.run_number, seen = state.seen_count(), "Listing pages exhausted");
        Ok(())
    }

    /// Scrape and store one detail page. Never fails: every problem ends up
    /// in the log and, when the store allows it, in a FAILED document.
    async fn process_item(&self, detail: &dyn PageContext, link: &DetailLink, identity: &str, metrics: &mut RunMetrics) {
        let site = &self.config.site;

        let scraped = scrape_detail(
            detail,
            &link.localized_url,
            site,
            &self.config.timing,
            self.config.crawler.capture_html,
        ).await;

        let document = match scraped {
            Ok(record) if record.is_empty() => {
                warn!(url = %identity, "{}", EMPTY_EXTRACTION);
                VehicleDocument::failed(link, identity, site, EMPTY_EXTRACTION)
            }
            Ok(record) => VehicleDocument::ok(link, identity, site, record),
            Err(err) => {
                warn!(url = %identity, "Failed to scrape detail page: {:#}", err);
                VehicleDocument::failed(link, identity, site, format!("{:#}", err))
            }
        };

        let write_error = match self.store.upsert(&document).await {
            Ok(()) => {
                match document.status {
                    DocumentStatus::Ok => metrics.saved += 1,
                    DocumentStatus::Failed => metrics.failed += 1,
                }
                info!(url = %identity, status = %document.status, "Saved vehicle document");
                return;
            }
            Err(err) => err,
        };

        error!(url = %identity, "Failed to save vehicle document: {:#}", write_error);
        metrics.store_errors += 1;

        // An OK document the store rejected is retried as a FAILED one
        if document.status == DocumentStatus::Ok {
            let fallback = VehicleDocument::failed(link, identity, site, format!("{:#}", write_error));
            match self.store.upsert(&fallback).await {
                Ok(()) => metrics.failed += 1,
                Err(err) => error!(url = %identity, "Failed to save failure document: {:#}", err),
            }
        }
    }
}

async fn release(ctx: &dyn PageContext, name: &str) {
    if let Err(err) = ctx.close().await {
        warn!(context = name, "Failed to close browsing context: {:#}", err);
    }
}
