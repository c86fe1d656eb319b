//! Notification fan-out: one sender task per recipient, three channel kinds
//! launched independently.
//!
//! Senders drive the pure `domain::delivery` state machine; the only async
//! parts are the delays, the retry gaps, and the POST itself.
pub mod gotify;
pub mod slack;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::app::context::AppContext;
use crate::domain::model::{ChatOverride, Monitor, PushOverride, Service};
use crate::domain::template::TemplateContext;
use crate::ports::http::Http;

/// Gap between consecutive sender launches within one channel kind.
pub const LAUNCH_GAP: Duration = Duration::from_secs(3);
/// Backoff between attempts of one sender.
pub const RETRY_GAP: Duration = Duration::from_secs(10);

/// Snapshot of the firing service handed to every sender.
#[derive(Debug, Clone)]
pub struct Firing {
    pub monitor_id: String,
    pub service_id: String,
    /// Canonical (non-API) URL.
    pub service_url: String,
    pub version: String,
    pub slack_override: ChatOverride,
    pub gotify_override: PushOverride,
}

impl Firing {
    pub fn new(monitor: &Monitor, service: &Service, version: String) -> Self {
        Self {
            monitor_id: monitor.id.clone(),
            service_id: service.id.clone(),
            service_url: service.canonical_url(),
            version,
            slack_override: service.slack.clone(),
            gotify_override: service.gotify.clone(),
        }
    }

    pub fn template_ctx(&self) -> TemplateContext<'_> {
        TemplateContext {
            monitor_id: &self.monitor_id,
            service_id: &self.service_id,
            service_url: &self.service_url,
            version: &self.version,
        }
    }
}

/// Fans a firing out to every non-skipped channel of the service's monitor.
///
/// The tracker spawns this and does not await it; completion here only means
/// every sender has reached a terminal state.
pub async fn dispatch<H: Http + 'static>(
    ctx: AppContext<H>,
    monitor_index: usize,
    service_index: usize,
    version: String,
) {
    let monitor = &ctx.cfg.monitors[monitor_index];
    let service = &monitor.services[service_index];
    let firing = Arc::new(Firing::new(monitor, service, version));
    debug!(
        service = %firing.service_id,
        monitor = %firing.monitor_id,
        version = %firing.version,
        "Dispatching notifications"
    );

    let mut kinds = Vec::new();
    if !service.skip_gotify {
        kinds.push(tokio::spawn(gotify::send_all(
            ctx.clone(),
            monitor_index,
            firing.clone(),
            None,
        )));
    }
    if !service.skip_slack {
        kinds.push(tokio::spawn(slack::send_all(
            ctx.clone(),
            monitor_index,
            firing.clone(),
            None,
        )));
    }
    if !service.skip_webhook {
        kinds.push(tokio::spawn(webhook::send_all(
            ctx.clone(),
            monitor_index,
            firing.clone(),
        )));
    }
    for kind in kinds {
        let _ = kind.await;
    }
}
