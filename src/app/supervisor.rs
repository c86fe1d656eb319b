//! Starts one tracker per service and keeps the process alive until shutdown.
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use crate::app::context::AppContext;
use crate::app::tracker;
use crate::ports::http::Http;

/// Startup spacing between tracker spawns, uniform in `[10, 20)` seconds, so
/// polls smear against upstreams instead of bursting together.
const SPAWN_JITTER_SECS: (u64, u64) = (10, 20);

/// Spawns every tracker with a jittered gap, then waits for all of them to
/// finish (which they only do on shutdown).
pub async fn run<H: Http + 'static>(ctx: AppContext<H>) {
    let mut trackers = Vec::with_capacity(ctx.cfg.service_count());

    'spawn: for (monitor_index, monitor) in ctx.cfg.monitors.iter().enumerate() {
        for (service_index, service) in monitor.services.iter().enumerate() {
            debug!(
                service = %service.id,
                url = %service.url,
                interval = ?service.interval,
                "Tracking service"
            );
            trackers.push(tokio::spawn(tracker::run(
                ctx.clone(),
                monitor_index,
                service_index,
            )));

            let gap = ctx
                .rng
                .jitter_secs(SPAWN_JITTER_SECS.0, SPAWN_JITTER_SECS.1)
                .await;
            if !ctx.shutdown.sleep(Duration::from_secs(gap)).await {
                break 'spawn;
            }
        }
    }

    join_all(trackers).await;
    info!("All trackers stopped");
}
