use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::browser::behavior;
use crate::browser::context::PageContext;
use crate::browser::script;
use crate::cli::config::{SiteProfile, TimingSettings};

/// A condition to wait for inside a rendered page
#[derive(Debug, Clone)]
pub struct ReadyCheck {
    pub name: &'static str,
    pub script: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl ReadyCheck {
    /// At least one listing result anchor is present
    pub fn list_ready(site: &SiteProfile, timing: &TimingSettings) -> Self {
        Self {
            name: "list-ready",
            script: script::list_ready(site),
            timeout: Duration::from_secs(timing.list_ready_timeout_secs),
            poll_interval: Duration::from_millis(timing.list_poll_ms),
        }
    }

    /// Any one of heading, breadcrumb, price text or vehicle image is present.
    /// Some detail pages omit one of the signals, so any single one counts.
    pub fn detail_ready(site: &SiteProfile, timing: &TimingSettings) -> Self {
        Self {
            name: "detail-ready",
            script: script::detail_ready(site),
            timeout: Duration::from_secs(timing.detail_ready_timeout_secs),
            poll_interval: Duration::from_millis(timing.detail_poll_ms),
        }
    }
}

/// Poll `check` until it is truthy or its timeout elapses.
///
/// Never fails: an evaluation error is "not ready yet". Scrolls a little
/// between polls to wake lazy-loaded content.
pub async fn await_condition(ctx: &dyn PageContext, check: &ReadyCheck) -> bool {
    let deadline = Instant::now() + check.timeout;
    let mut polls = 0u32;

    behavior::nudge(ctx).await;

    loop {
        polls += 1;
        if ctx.evaluate(&check.script).await.is_truthy() {
            debug!(check = check.name, polls, "Condition met");
            return true;
        }

        if Instant::now() + check.poll_interval > deadline {
            break;
        }

        sleep(check.poll_interval).await;
        behavior::nudge(ctx).await;
    }

    debug!(check = check.name, polls, timeout_secs = check.timeout.as_secs(), "Condition not met before timeout");
    false
}
