use rand::{thread_rng, Rng};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::browser::context::PageContext;
use crate::browser::script;

/// Small scroll to a random offset near the top of the page. Lazy-loaded
/// sections only start fetching once they come close to the viewport.
pub async fn nudge(ctx: &dyn PageContext) {
    let offset = thread_rng().gen_range(200..900);
    // evaluation failures are harmless here
    let _ = ctx.evaluate(&script::scroll_to(offset)).await;
}

/// Visit each offset in turn, pausing `step` after each scroll
pub async fn sweep(ctx: &dyn PageContext, offsets: &[i64], step: Duration) {
    for &offset in offsets {
        let _ = ctx.evaluate(&script::scroll_to(offset)).await;
        sleep(step).await;
    }

    debug!("Scroll sweep over {} offsets done", offsets.len());
}
