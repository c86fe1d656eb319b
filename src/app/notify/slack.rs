//! Chat incoming-webhook sender.
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::app::context::AppContext;
use crate::app::notify::{Firing, LAUNCH_GAP, RETRY_GAP};
use crate::domain::delivery::DeliveryState;
use crate::domain::model::SlackRecipient;
use crate::domain::template;
use crate::ports::http::Http;

#[derive(Debug, Clone, Serialize)]
pub struct SlackPayload {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    pub text: String,
}

/// The service-level override wins over the recipient defaults; when it
/// supplies one icon the other is blanked so both are never emitted together.
pub fn build_payload(
    recipient: &SlackRecipient,
    firing: &Firing,
    custom_message: Option<&str>,
) -> SlackPayload {
    let ov = &firing.slack_override;

    let mut icon_emoji = ov.icon_emoji.clone().or_else(|| recipient.icon_emoji.clone());
    let mut icon_url = ov.icon_url.clone().or_else(|| recipient.icon_url.clone());
    if ov.icon_emoji.is_some() {
        icon_url = None;
    } else if ov.icon_url.is_some() {
        icon_emoji = None;
    }

    // Pre-rendered escalation messages go out verbatim.
    let text = match custom_message {
        Some(m) => m.to_string(),
        None => template::render(
            ov.message.as_deref().unwrap_or(&recipient.message),
            &firing.template_ctx(),
        ),
    };

    SlackPayload {
        username: ov
            .username
            .clone()
            .unwrap_or_else(|| recipient.username.clone()),
        icon_emoji,
        icon_url,
        text,
    }
}

/// Launches one sender per recipient with the standard gap, then waits for
/// all of them to reach a terminal state.
pub async fn send_all<H: Http + 'static>(
    ctx: AppContext<H>,
    monitor_index: usize,
    firing: Arc<Firing>,
    custom_message: Option<Arc<String>>,
) {
    let recipients = ctx.cfg.monitors[monitor_index].slack.len();
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
    let recipient = &ctx.cfg.monitors[monitor_index].slack[recipient_index];
    if !recipient.delay.is_zero() {
        info!(
            service = %firing.service_id,
            monitor = %firing.monitor_id,
            delay = ?recipient.delay,
            "Sleeping before sending the Slack message"
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
                        info!(service = %firing.service_id, monitor = %firing.monitor_id, "Slack message sent");
                        true
                    }
                    Err(e) => {
                        error!(service = %firing.service_id, monitor = %firing.monitor_id, error = %e, "Sending Slack failed");
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
            "Failed {} times to send a Slack message to {}",
            recipient.max_tries,
            recipient.url
        );
    }
}

async fn attempt<H: Http + ?Sized>(
    http: &H,
    recipient: &SlackRecipient,
    firing: &Firing,
    custom_message: Option<&String>,
) -> Result<(), String> {
    let payload = build_payload(recipient, firing, custom_message.map(String::as_str));
    let body = serde_json::to_vec(&payload).map_err(|e| e.to_string())?;
    let mut res = http.post_json(&recipient.url, body, Vec::new()).await;

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
