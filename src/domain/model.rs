//! Resolved configuration entities and transport result types.
//!
//! Everything here is strict: booleans are `bool`, durations are `Duration`,
//! priorities are integers. The lenient config surface (one-or-many lists,
//! `yes`/`no` strings, bare-integer durations) lives in `infra::config` and is
//! normalized away before these types are constructed.
use std::time::Duration;

use serde::Serialize;

use crate::domain::commands::{MissMask, UrlCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// A code-forge releases endpoint; the URL is canonicalised to the
    /// `releases/latest` API path and the body is JSON with a `tag_name`.
    Github,
    /// An arbitrary HTTP document; the body seeds the extraction program.
    Url,
}

/// Per-service chat template overrides. Wins over the recipient defaults.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatOverride {
    pub username: Option<String>,
    pub message: Option<String>,
    pub icon_emoji: Option<String>,
    pub icon_url: Option<String>,
}

/// Per-service push template overrides.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushOverride {
    pub title: Option<String>,
    pub message: Option<String>,
}

/// One polled upstream endpoint together with its extraction program.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ServiceKind,
    pub url: String,
    pub commands: Vec<UrlCommand>,
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    pub progressive_versioning: bool,
    pub regex_content: Option<String>,
    pub regex_version: Option<String>,
    pub access_token: Option<String>,
    pub allow_invalid_certs: bool,
    pub skip_gotify: bool,
    pub skip_slack: bool,
    pub skip_webhook: bool,
    pub gotify: PushOverride,
    pub slack: ChatOverride,
}

impl Service {
    /// The user-facing URL substituted for `${service_url}`. Forge services
    /// point at the API internally; reconstruct the repository page from it.
    pub fn canonical_url(&self) -> String {
        match self.kind {
            ServiceKind::Github => {
                let mut segs = self
                    .url
                    .splitn(2, "github.com/repos/")
                    .nth(1)
                    .unwrap_or("")
                    .split('/');
                match (segs.next(), segs.next()) {
                    (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                        format!("https://github.com/{owner}/{repo}")
                    }
                    _ => self.url.clone(),
                }
            }
            ServiceKind::Url => self.url.clone(),
        }
    }
}

/// A named group binding polled services to a shared set of recipients.
#[derive(Debug, Clone, Serialize)]
pub struct Monitor {
    pub id: String,
    #[serde(rename = "service")]
    pub services: Vec<Service>,
    pub gotify: Vec<GotifyRecipient>,
    pub slack: Vec<SlackRecipient>,
    #[serde(rename = "webhook")]
    pub webhooks: Vec<WebhookRecipient>,
}

/// Optional URL templates attached to a push message
/// (android action, client display, client notification).
#[derive(Debug, Clone, Default, Serialize)]
pub struct GotifyExtras {
    pub android_action: Option<String>,
    pub client_display: Option<String>,
    pub client_notification: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GotifyRecipient {
    pub url: String,
    pub token: String,
    pub priority: i64,
    pub title: String,
    pub message: String,
    pub extras: GotifyExtras,
    #[serde(with = "duration_secs")]
    pub delay: Duration,
    pub max_tries: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlackRecipient {
    pub url: String,
    pub icon_emoji: Option<String>,
    pub icon_url: Option<String>,
    pub username: String,
    pub message: String,
    #[serde(with = "duration_secs")]
    pub delay: Duration,
    pub max_tries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookKind {
    /// Emulate a code-forge push event (signed body, forge identity headers).
    Github,
    /// An opaque endpoint. Carries the same signed payload today.
    Url,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookRecipient {
    #[serde(rename = "type")]
    pub kind: WebhookKind,
    pub url: String,
    pub secret: String,
    /// 0 means "any 2xx".
    pub desired_status_code: u16,
    #[serde(with = "duration_secs")]
    pub delay: Duration,
    pub max_tries: u32,
    pub silent_fails: bool,
}

/// The fully-resolved process configuration.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    #[serde(rename = "monitor")]
    pub monitors: Vec<Monitor>,
}

impl AppConfig {
    pub fn service_count(&self) -> usize {
        self.monitors.iter().map(|m| m.services.len()).sum()
    }
}

/// Mutable per-service state, owned exclusively by the service's tracker.
#[derive(Debug, Default)]
pub struct ServiceStatus {
    /// Latest accepted version; empty until the first observation seeds it.
    pub version: String,
    pub content_regex_misses: u32,
    pub version_regex_misses: u32,
    pub miss_mask: MissMask,
}

/// Coarse transport failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    Timeout,
    Connect,
    /// Certificate verification failed. Non-fatal for polls.
    Tls,
    Unexpected,
}

#[derive(Debug, Clone)]
pub struct HttpError {
    pub kind: HttpErrorKind,
    pub message: String,
}

/// Outcome of a poll GET: either a body or a classified transport error.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<HttpError>,
}

/// Outcome of a notification POST.
#[derive(Debug, Clone)]
pub struct PostResult {
    pub status: Option<u16>,
    pub body: Option<String>,
    pub error: Option<String>,
}

impl PostResult {
    pub fn is_2xx(&self) -> bool {
        matches!(self.status, Some(s) if (200..300).contains(&s))
    }
}

pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{}s", d.as_secs()))
    }
}
