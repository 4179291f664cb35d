use regex::Regex;
use tokio::time::sleep;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::browser::context::PageContext;
use crate::browser::readiness::{await_condition, ReadyCheck};
use crate::browser::script;
use crate::cli::config::{SiteProfile, TimingSettings};
use crate::crawler::record::dedup_ordered;
use crate::error::ScrapeError;

/// One page of paginated search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPageRef {
    pub template: String,
    pub page_number: u32,
}

impl ListingPageRef {
    pub fn new(template: impl Into<String>, page_number: u32) -> Self {
        Self {
            template: template.into(),
            page_number,
        }
    }

    /// Render the page URL. Supports a `{page}` placeholder, an existing
    /// `page=N` parameter, or neither (the parameter is appended).
    pub fn url(&self) -> String {
        let page = self.page_number.to_string();

        if self.template.contains("{page}") {
            return self.template.replace("{page}", &page);
        }

        let existing = Regex::new(r"([?&])page=\d*").ok()
            .filter(|pattern| pattern.is_match(&self.template));
        if let Some(pattern) = existing {
            return pattern
                .replace(&self.template, format!("${{1}}page={}", page).as_str())
                .into_owned();
        }

        let separator = if self.template.contains('?') { '&' } else { '?' };
        format!("{}{}page={}", self.template, separator, page)
    }
}

/// A detail link as found on a listing page, plus its derived forms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailLink {
    pub href: String,
    pub absolute_url: String,
    pub localized_url: String,
}

impl DetailLink {
    /// Resolve `href` against the site origin. `None` unless it lands on
    /// an http(s) address.
    pub fn resolve(href: &str, site: &SiteProfile) -> Option<Self> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }

        let base = Url::parse(&site.origin).ok()?;
        let absolute = base.join(href).ok()?;
        if !matches!(absolute.scheme(), "http" | "https") {
            return None;
        }

        let absolute_url = absolute.to_string();
        Some(Self {
            href: href.to_string(),
            localized_url: localize(&absolute_url, site),
            absolute_url,
        })
    }
}

/// Locale variant of `url`: the locale segment becomes the first path
/// segment unless it is already there. Matched on host, so either scheme
/// is localized; URLs on other hosts are left alone.
pub fn localize(url: &str, site: &SiteProfile) -> String {
    let locale = site.locale.trim_matches('/');
    let (Ok(mut parsed), Ok(origin)) = (Url::parse(url), Url::parse(&site.origin)) else {
        return url.to_string();
    };

    let same_site = parsed.host_str().is_some()
        && parsed.host_str() == origin.host_str()
        && parsed.port() == origin.port();
    if locale.is_empty() || !same_site {
        return url.to_string();
    }

    let first_segment = parsed.path().trim_start_matches('/').split('/').next().unwrap_or("");
    if first_segment == locale {
        return url.to_string();
    }

    let path = format!("/{}{}", locale, parsed.path());
    parsed.set_path(&path);
    parsed.to_string()
}

/// Resolve raw hrefs into detail links, dropping non-http(s) targets and
/// duplicates that only differ before resolution
pub fn resolve_links(hrefs: &[String], site: &SiteProfile) -> Vec<DetailLink> {
    let mut seen = std::collections::HashSet::new();
    hrefs.iter()
        .filter_map(|href| DetailLink::resolve(href, site))
        .filter(|link| seen.insert(link.absolute_url.clone()))
        .collect()
}

/// Wait for the listing to render and read its result hrefs.
///
/// Fails with `NoResults` when no result anchor shows up in time; the
/// caller decides what that means for the run.
pub async fn collect_links(
    ctx: &dyn PageContext,
    page_url: &str,
    site: &SiteProfile,
    timing: &TimingSettings,
) -> Result<Vec<String>, ScrapeError> {
    sleep(Duration::from_millis(timing.list_settle_ms)).await;

    let check = ReadyCheck::list_ready(site, timing);
    if !await_condition(ctx, &check).await {
        return Err(ScrapeError::NoResults {
            url: page_url.to_string(),
            waited_secs: check.timeout.as_secs(),
        });
    }

    let hrefs = dedup_ordered(
        ctx.evaluate(&script::collect_listing_hrefs(site)).await
            .as_strings(),
    );

    debug!(url = page_url, count = hrefs.len(), "Collected listing hrefs");

    Ok(hrefs)
}
