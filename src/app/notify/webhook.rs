//! Signed forge-push-event webhook sender.
//!
//! Every attempt builds a fresh payload with fresh identifiers so retries are
//! indistinguishable from real deliveries. On give-up the failure escalates to
//! the monitor's chat and push recipients unless the recipient is marked
//! `silent_fails`.
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::app::context::AppContext;
use crate::app::notify::{gotify, slack, Firing, LAUNCH_GAP, RETRY_GAP};
use crate::domain::delivery::DeliveryState;
use crate::domain::model::WebhookRecipient;
use crate::domain::signature;
use crate::infra::random::MutexRng;
use crate::ports::http::Http;

#[derive(Debug, Clone, Serialize)]
pub struct PushEventPayload {
    pub r#ref: String,
    pub before: String,
    pub after: String,
}

/// Serialized body plus the forge identity and signature headers. The
/// signatures are computed over the exact bytes returned.
pub async fn build_request(
    rng: &MutexRng,
    secret: &str,
) -> Result<(Vec<u8>, Vec<(String, String)>), String> {
    let payload = PushEventPayload {
        r#ref: "refs/heads/master".to_string(),
        before: rng.alnum_lower(40).await,
        after: rng.alnum_lower(40).await,
    };
    let body = serde_json::to_vec(&payload).map_err(|e| e.to_string())?;

    let headers = vec![
        ("X-GitHub-Event".to_string(), "push".to_string()),
        ("X-GitHub-Hook-ID".to_string(), rng.digits(9).await),
        ("X-GitHub-Delivery".to_string(), rng.delivery_id().await),
        (
            "X-GitHub-Hook-Installation-Target-ID".to_string(),
            rng.digits(9).await,
        ),
        (
            "X-GitHub-Hook-Installation-Target-Type".to_string(),
            "repository".to_string(),
        ),
        (
            "X-Hub-Signature-256".to_string(),
            signature::sha256_header(secret, &body),
        ),
        (
            "X-Hub-Signature".to_string(),
            signature::sha1_header(secret, &body),
        ),
    ];
    Ok((body, headers))
}

/// Launches one sender per recipient with the standard gap, then waits for
/// all of them to reach a terminal state.
pub async fn send_all<H: Http + 'static>(
    ctx: AppContext<H>,
    monitor_index: usize,
    firing: Arc<Firing>,
) {
    let recipients = ctx.cfg.monitors[monitor_index].webhooks.len();
    let mut senders = Vec::with_capacity(recipients);
    for index in 0..recipients {
        senders.push(tokio::spawn(send_one(
            ctx.clone(),
            monitor_index,
            index,
            firing.clone(),
        )));
        if !ctx.shutdown.sleep(LAUNCH_GAP).await {
            break;
        }
    }
    for sender in senders {
        let _ = sender.await;
    }
}

async fn send_one<H: Http + 'static>(
    ctx: AppContext<H>,
    monitor_index: usize,
    recipient_index: usize,
    firing: Arc<Firing>,
) {
    let recipient = &ctx.cfg.monitors[monitor_index].webhooks[recipient_index];
    if !recipient.delay.is_zero() {
        info!(
            service = %firing.service_id,
            monitor = %firing.monitor_id,
            delay = ?recipient.delay,
            "Sleeping before sending the WebHook"
        );
    }

    let mut state = DeliveryState::new();
    while !state.is_terminal() {
        state = match state {
            DeliveryState::Delaying => {
                if !ctx.shutdown.sleep(recipient.delay).await {
                    return;
                }
                state.delay_elapsed(recipient.max_tries)
            }
            DeliveryState::Sending { .. } => {
                let delivered =
                    match attempt(ctx.http.as_ref(), &ctx.rng, recipient).await {
                        Ok(status) => {
                            info!(
                                service = %firing.service_id,
                                monitor = %firing.monitor_id,
                                status,
                                "WebHook received"
                            );
                            true
                        }
                        Err(e) => {
                            error!(service = %firing.service_id, monitor = %firing.monitor_id, error = %e, "Sending WebHook failed");
                            false
                        }
                    };
                state.attempted(delivered)
            }
            DeliveryState::Retrying { .. } => {
                if !ctx.shutdown.sleep(RETRY_GAP).await {
                    return;
                }
                state.retry_elapsed()
            }
            terminal => terminal,
        };
    }

    if state == DeliveryState::GaveUp {
        let message = format!(
            "{}, Failed {} times to send a WebHook to {}",
            firing.monitor_id, recipient.max_tries, recipient.url
        );
        error!(service = %firing.service_id, monitor = %firing.monitor_id, "{message}");

        if !recipient.silent_fails {
            let message = Arc::new(message);
            let chat = slack::send_all(
                ctx.clone(),
                monitor_index,
                firing.clone(),
                Some(message.clone()),
            );
            let push = gotify::send_all(ctx.clone(), monitor_index, firing.clone(), Some(message));
            tokio::join!(chat, push);
            state = state.escalated();
        }
    }
    debug!(
        service = %firing.service_id,
        monitor = %firing.monitor_id,
        state = ?state,
        "WebHook delivery finished"
    );
}

async fn attempt<H: Http + ?Sized>(
    http: &H,
    rng: &MutexRng,
    recipient: &WebhookRecipient,
) -> Result<u16, String> {
    let (body, headers) = build_request(rng, &recipient.secret).await?;
    let mut res = http.post_json(&recipient.url, body, headers).await;

    if let Some(e) = res.error.take() {
        return Err(e);
    }
    let status = res.status.unwrap_or_default();
    let accepted = status == recipient.desired_status_code
        || (recipient.desired_status_code == 0 && res.is_2xx());
    if accepted {
        Ok(status)
    } else {
        let wanted = if recipient.desired_status_code == 0 {
            "2XX".to_string()
        } else {
            recipient.desired_status_code.to_string()
        };
        Err(format!(
            "WebHook didn't {wanted}: {status}. {}",
            res.body.unwrap_or_default()
        ))
    }
}
