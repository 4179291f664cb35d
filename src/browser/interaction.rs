use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::browser::context::PageContext;
use crate::browser::script;
use crate::cli::config::{SiteProfile, TimingSettings};

/// How an expand attempt ended. Every variant is a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// The page has no expand control
    Absent,
    /// More feature chips appeared after the click
    Grew { before: u64, after: u64 },
    /// The clicked control left the page
    ControlGone,
    /// Neither signal arrived in time; extraction goes ahead anyway
    TimedOut,
}

/// Reveal the collapsed feature list, if the page has one.
///
/// The control is looked up by its accessible name first, then by its
/// "show more (N)" text. After clicking, waits until the chip count grows
/// or the control disappears.
pub async fn expand_hidden_features(
    ctx: &dyn PageContext,
    site: &SiteProfile,
    timing: &TimingSettings,
) -> ExpandOutcome {
    let count_script = script::count_feature_chips(site);
    let before = ctx.evaluate(&count_script).await.as_count();

    let clicked = ctx.evaluate(&script::click_expand_control(site)).await.is_truthy()
        || ctx.evaluate(&script::click_show_more(site)).await.is_truthy();

    if !clicked {
        debug!("No feature expand control on page");
        return ExpandOutcome::Absent;
    }

    let poll = Duration::from_millis(timing.expand_poll_ms);
    let deadline = Instant::now() + Duration::from_secs(timing.expand_timeout_secs);
    let gone_script = script::expand_control_gone(site);

    while Instant::now() < deadline {
        sleep(poll).await;

        let after = ctx.evaluate(&count_script).await.as_count();
        if after > before {
            debug!(before, after, "Feature list expanded");
            return ExpandOutcome::Grew { before, after };
        }

        if ctx.evaluate(&gone_script).await.is_truthy() {
            debug!("Expand control disappeared");
            return ExpandOutcome::ControlGone;
        }
    }

    debug!(before, "Feature list did not change before timeout");
    ExpandOutcome::TimedOut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::context::Evaluation;
    use crate::testing::FakeEngine;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_absent_control_is_a_no_op() {
        let site = SiteProfile::default();
        let count = script::count_feature_chips(&site);
        let engine = FakeEngine::new(move |_url, script| {
            if script == count {
                Evaluation::from_json(json!(4))
            } else {
                Evaluation::from_json(json!(false))
            }
        });
        let ctx = engine.context();

        let started = Instant::now();
        let outcome = expand_hidden_features(ctx.as_ref(), &site, &TimingSettings::default()).await;

        assert_eq!(outcome, ExpandOutcome::Absent);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_then_chip_count_grows() {
        let site = SiteProfile::default();
        let count = script::count_feature_chips(&site);
        let click = script::click_expand_control(&site);
        let chips = Arc::new(AtomicU64::new(6));
        let chips_seen = chips.clone();

        let engine = FakeEngine::new(move |_url, script| {
            if script == count {
                Evaluation::from_json(json!(chips_seen.load(Ordering::SeqCst)))
            } else if script == click {
                chips_seen.store(57, Ordering::SeqCst);
                Evaluation::from_json(json!(true))
            } else {
                Evaluation::from_json(json!(false))
            }
        });
        let ctx = engine.context();

        let outcome = expand_hidden_features(ctx.as_ref(), &site, &TimingSettings::default()).await;
        assert_eq!(outcome, ExpandOutcome::Grew { before: 6, after: 57 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_control_disappears() {
        let site = SiteProfile::default();
        let show_more = script::click_show_more(&site);
        let gone = script::expand_control_gone(&site);

        let engine = FakeEngine::new(move |_url, script| {
            if script == show_more || script == gone {
                Evaluation::from_json(json!(true))
            } else if script.contains("featureChip).length") {
                Evaluation::from_json(json!(3))
            } else {
                Evaluation::Failed("no such element".into())
            }
        });
        let ctx = engine.context();

        let outcome = expand_hidden_features(ctx.as_ref(), &site, &TimingSettings::default()).await;
        assert_eq!(outcome, ExpandOutcome::ControlGone);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_signal() {
        let site = SiteProfile::default();
        let click = script::click_expand_control(&site);
        let timing = TimingSettings::default();

        let engine = FakeEngine::new(move |_url, script| {
            if script == click {
                Evaluation::from_json(json!(true))
            } else {
                Evaluation::from_json(json!(0))
            }
        });
        let ctx = engine.context();

        let started = Instant::now();
        let outcome = expand_hidden_features(ctx.as_ref(), &site, &timing).await;

        assert_eq!(outcome, ExpandOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(timing.expand_timeout_secs));
    }
}
