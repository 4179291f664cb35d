use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::browser::behavior;
use crate::browser::context::{Evaluation, PageContext};
use crate::browser::interaction::{expand_hidden_features, ExpandOutcome};
use crate::browser::readiness::{await_condition, ReadyCheck};
use crate::browser::script;
use crate::cli::config::{SiteProfile, TimingSettings};
use crate::crawler::record::{assemble, DetailRecord, PageSnapshot};

/// Load one detail page in `ctx` and extract its record.
///
/// Only navigation errors are returned. A page that never signals
/// readiness is still extracted, whatever made it onto the page.
pub async fn scrape_detail(
    ctx: &dyn PageContext,
    url: &str,
    site: &SiteProfile,
    timing: &TimingSettings,
    capture_html: bool,
) -> Result<DetailRecord> {
    ctx.navigate(url).await
        .with_context(|| format!("Failed to load detail page {}", url))?;

    let check = ReadyCheck::detail_ready(site, timing);
    if !await_condition(ctx, &check).await {
        warn!(url, waited_secs = check.timeout.as_secs(), "Detail page not ready, extracting anyway");
    }

    sleep(Duration::from_millis(timing.detail_settle_ms)).await;
    behavior::sweep(ctx, &timing.scroll_sweep, Duration::from_millis(timing.scroll_step_ms)).await;

    match expand_hidden_features(ctx, site, timing).await {
        ExpandOutcome::Grew { before, after } => {
            debug!(url, before, after, added = after - before, "Feature list expanded");
        }
        outcome => debug!(url, ?outcome, "Feature expansion finished"),
    }

    Ok(extract(ctx, site, capture_html).await)
}

/// Read the page as it currently stands. An extraction script that fails
/// or returns garbage gives an empty record, never an error.
pub async fn extract(ctx: &dyn PageContext, site: &SiteProfile, capture_html: bool) -> DetailRecord {
    let evaluation = ctx.evaluate(&script::extract_detail(site, capture_html)).await;
    if let Evaluation::Failed(reason) = &evaluation {
        debug!("Extraction script failed: {}", reason);
    }

    match evaluation.decode::<PageSnapshot>() {
        Some(snapshot) => assemble(snapshot, site),
        None => DetailRecord::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use serde_json::json;
    use tokio::time::Instant;

    fn snapshot() -> serde_json::Value {
        json!({
            "title": "  Kia K5 2025  ",
            "breadcrumbItems": [
                {"text": "Home", "href": "/"},
                {"text": "Kia", "href": "/new-cars/kia"},
                {"text": "K5", "href": null}
            ],
            "priceCandidate": "يبدأ من SAR 96,600",
            "imageSources": [
                "https://cdn.example/resized/car_model/9/webp_listing_main.webp",
                "https://cdn.example/resized/car_model/9/webp_thumb_1.webp"
            ],
            "highlightItems": [{"label": "Engine", "value": "2.5L"}],
            "measurementItems": [],
            "featureTitles": ["ABS", "ABS", "Cruise control"],
            "expandLabel": "Show more (12)"
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrape_detail_assembles_record() {
        let site = SiteProfile::default();
        let ready = script::detail_ready(&site);
        let extraction = script::extract_detail(&site, false);

        let engine = FakeEngine::new(move |_url, script| {
            if script == ready {
                Evaluation::from_json(json!(true))
            } else if script == extraction {
                // scripts hand the snapshot back as a JSON string
                Evaluation::from_json(json!(snapshot().to_string()))
            } else {
                Evaluation::Empty
            }
        });
        let ctx = engine.context();

        let record = scrape_detail(ctx.as_ref(), "https://ksa.yallamotor.com/new-cars/kia/k5/2025",
            &site, &TimingSettings::default(), false).await.unwrap();

        assert_eq!(record.title.as_deref(), Some("Kia K5 2025"));
        assert_eq!(record.breadcrumbs, vec!["Home", "Kia", "K5"]);
        assert_eq!(record.price_text.as_deref(), Some("SAR 96,600"));
        assert_eq!(record.price_number, Some(96600));
        assert_eq!(record.images.len(), 1);
        assert_eq!(record.features, vec!["ABS", "Cruise control"]);
        assert_eq!(record.features_count_hint, Some(12));
        assert!(record.html.is_none());
        assert_eq!(engine.navigations(), vec!["https://ksa.yallamotor.com/new-cars/kia/k5/2025"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_features_are_read_after_expansion() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let site = SiteProfile::default();
        let click = script::click_expand_control(&site);
        let count = script::count_feature_chips(&site);
        let extraction = script::extract_detail(&site, false);
        let expanded = Arc::new(AtomicBool::new(false));
        let seen = expanded.clone();

        let engine = FakeEngine::new(move |_url, script| {
            let open = seen.load(Ordering::SeqCst);
            if script == click {
                seen.store(true, Ordering::SeqCst);
                Evaluation::from_json(json!(true))
            } else if script == count {
                Evaluation::from_json(json!(if open { 3 } else { 1 }))
            } else if script == extraction {
                let features = if open { vec!["ABS", "Sunroof", "Cruise control"] } else { vec!["ABS"] };
                Evaluation::from_json(json!({"title": "Kia K5", "featureTitles": features}))
            } else {
                Evaluation::from_json(json!(true))
            }
        });
        let ctx = engine.context();

        let record = scrape_detail(ctx.as_ref(), "https://x/detail", &site, &TimingSettings::default(), false)
            .await
            .unwrap();

        assert_eq!(record.features, vec!["ABS", "Sunroof", "Cruise control"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_page_is_still_extracted() {
        let site = SiteProfile::default();
        let timing = TimingSettings::default();
        let extraction = script::extract_detail(&site, false);

        let engine = FakeEngine::new(move |_url, script| {
            if script == extraction {
                Evaluation::from_json(json!({"title": "Partial page"}))
            } else {
                Evaluation::Failed("javascript error".into())
            }
        });
        let ctx = engine.context();

        let started = Instant::now();
        let record = scrape_detail(ctx.as_ref(), "https://x/detail", &site, &timing, false).await.unwrap();

        assert_eq!(record.title.as_deref(), Some("Partial page"));
        assert!(started.elapsed() >= Duration::from_secs(timing.detail_ready_timeout_secs));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failure_is_returned() {
        let site = SiteProfile::default();
        let engine = FakeEngine::with_failing(|_url, _script| Evaluation::Empty, &["https://x/broken"]);
        let ctx = engine.context();

        let err = scrape_detail(ctx.as_ref(), "https://x/broken", &site, &TimingSettings::default(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("https://x/broken"));
    }

    #[tokio::test]
    async fn test_extract_garbage_gives_empty_record() {
        let site = SiteProfile::default();
        let engine = FakeEngine::new(|_url, _script| Evaluation::from_json(json!("not json at all")));
        let ctx = engine.context();

        let record = extract(ctx.as_ref(), &site, false).await;
        assert!(record.is_empty());
    }
}
