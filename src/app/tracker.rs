//! Long-lived poll loop for one service.
use tracing::{debug, error};

use crate::app::context::AppContext;
use crate::app::{notify, querier};
use crate::domain::model::ServiceStatus;
use crate::ports::http::Http;

/// Polls the service forever: query, fan out on a transition, sleep the
/// interval. The fan-out is spawned and not awaited, so a slow recipient
/// never delays the next poll.
///
/// The status is local to this task; nothing else reads or writes it.
pub async fn run<H: Http + 'static>(
    ctx: AppContext<H>,
    monitor_index: usize,
    service_index: usize,
) {
    let mut status = ServiceStatus::default();
    loop {
        let monitor = &ctx.cfg.monitors[monitor_index];
        let service = &monitor.services[service_index];

        match querier::query(ctx.http.as_ref(), service, &monitor.id, &mut status).await {
            Ok(true) => {
                tokio::spawn(notify::dispatch(
                    ctx.clone(),
                    monitor_index,
                    service_index,
                    status.version.clone(),
                ));
            }
            Ok(false) => {}
            Err(e) => {
                // Misconfiguration that every future cycle would repeat.
                error!(service = %service.id, monitor = %monitor.id, "{e}");
                std::process::exit(1);
            }
        }

        if !ctx.shutdown.sleep(service.interval).await {
            break;
        }
    }
    debug!(
        service = %ctx.cfg.monitors[monitor_index].services[service_index].id,
        "Tracker stopped"
    );
}
