//! Push-gateway sender.
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::app::context::AppContext;
use crate::app::notify::{Firing, LAUNCH_GAP, RETRY_GAP};
use crate::domain::delivery::DeliveryState;
use crate::domain::model::{GotifyExtras, GotifyRecipient};
use crate::domain::template;
use crate::ports::http::Http;

#[derive(Debug, Clone, Serialize)]
pub struct GotifyPayload {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
    pub message: String,
    pub priority: i64,
    pub title: String,
}

/// Nested extras maps understood by the gateway clients; each template only
/// substitutes `${service_url}`.
fn extras_map(extras: &GotifyExtras, service_url: &str) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(t) = &extras.android_action {
        map.insert(
            "android::action".to_string(),
            json!({ "onReceive": { "intentUrl": t.replace("${service_url}", service_url) } }),
        );
    }
    if let Some(t) = &extras.client_display {
        map.insert(
            "client::display".to_string(),
            json!({ "click": { "url": t.replace("${service_url}", service_url) } }),
        );
    }
    if let Some(t) = &extras.client_notification {
        map.insert(
            "client::notification".to_string(),
            json!({ "click": { "url": t.replace("${service_url}", service_url) } }),
        );
    }
    map
}

pub fn build_payload(
    recipient: &GotifyRecipient,
    firing: &Firing,
    custom_message: Option<&str>,
) -> GotifyPayload {
    let ov = &firing.gotify_override;
    let (title, message) = match custom_message {
        // Pre-rendered escalation messages go out verbatim.
        Some(m) => (firing.monitor_id.clone(), m.to_string()),
        None => {
            let ctx = firing.template_ctx();
            (
                template::render(ov.title.as_deref().unwrap_or(&recipient.title), &ctx),
                template::render(ov.message.as_deref().unwrap_or(&recipient.message), &ctx),
            )
        }
    };

    GotifyPayload {
        extras: extras_map(&recipient.extras, &firing.service_url),
        message,
        priority: recipient.priority,
        title,
    }
}

/// Message endpoint with the recipient's application token.
pub fn message_url(recipient: &GotifyRecipient) -> String {
    format!("{}/message?token={}", recipient.url, recipient.token)
}

/// Launches one sender per recipient with the standard gap, then waits for
/// all of them to reach a terminal state.
pub async fn send_all<H: Http + 'static>(
    ctx: AppContext<H>,
    monitor_index: usize,
    firing: Arc<Firing>,
    custom_message: Option<Arc<String>>,
) {
    let recipients = ctx.cfg.monitors[monitor_index].gotify.len();
    let mut senders = Vec::with_capacity(recipients);
    for index in 0..recipients {
        senders.push(tokio::spawn(send_one(
            ctx.clone(),
            monitor_index,
            index,
            firing.clone(),
            custom_message.clone(),
        )));
        if !ctx.shutdown.sleep(LAUNCH_GAP).await {
            break;
        }
    }
    for sender in senders {
        let _ = sender.await;
    }
}

async fn send_one<H: Http>(
    ctx: AppContext<H>,
    monitor_index: usize,
    recipient_index: usize,
    firing: Arc<Firing>,
    custom_message: Option<Arc<String>>,
) {
    let recipient = &ctx.cfg.monitors[monitor_index].gotify[recipient_index];
    if !recipient.delay.is_zero() {
        info!(
            service = %firing.service_id,
            monitor = %firing.monitor_id,
            delay = ?recipient.delay,
            "Sleeping before sending the Gotify message"
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
                let delivered = match attempt(ctx.http.as_ref(), recipient, &firing, custom_message.as_deref()).await {
                    Ok(()) => {
                        info!(service = %firing.service_id, monitor = %firing.monitor_id, "Gotify message sent");
                        true
                    }
                    Err(e) => {
                        error!(service = %firing.service_id, monitor = %firing.monitor_id, error = %e, "Sending Gotify failed");
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
        error!(
            service = %firing.service_id,
            monitor = %firing.monitor_id,
            "Failed {} times to send a Gotify message to {}",
            recipient.max_tries,
            recipient.url
        );
    }
}

async fn attempt<H: Http + ?Sized>(
    http: &H,
    recipient: &GotifyRecipient,
    firing: &Firing,
    custom_message: Option<&String>,
) -> Result<(), String> {
    let payload = build_payload(recipient, firing, custom_message.map(String::as_str));
    let body = serde_json::to_vec(&payload).map_err(|e| e.to_string())?;
    let mut res = http
        .post_json(&message_url(recipient), body, Vec::new())
        .await;

    if let Some(e) = res.error.take() {
        return Err(e);
    }
    if res.is_2xx() {
        Ok(())
    } else {
        Err(format!(
            "{}. {}",
            res.status.unwrap_or_default(),
            res.body.unwrap_or_default()
        ))
    }
}
