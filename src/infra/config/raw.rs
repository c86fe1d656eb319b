//! Lenient deserialization surface for the YAML config.
//!
//! The grammar tolerates a single mapping wherever a list is expected,
//! `yes`/`no`-style booleans, and bare-integer durations. Nothing here is
//! validated; `infra::config` resolves these into the strict domain model.
use serde::Deserialize;

/// A list field that also accepts a single object as a one-element shorthand.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(x) => vec![x],
        }
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

/// `true`/`yes` (case-insensitive) and literal booleans are truthy; anything
/// else is falsy.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawBool {
    Bool(bool),
    Text(String),
}

impl RawBool {
    pub fn as_bool(&self) -> bool {
        match self {
            RawBool::Bool(b) => *b,
            RawBool::Text(s) => {
                matches!(s.to_ascii_lowercase().as_str(), "true" | "yes" | "y")
            }
        }
    }
}

/// `AhBmCs` string or bare integer seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawDuration {
    Seconds(u64),
    Text(String),
}

/// Priority is an integer even when written as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawPriority {
    Int(i64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub defaults: RawDefaults,
    #[serde(default)]
    pub monitor: OneOrMany<RawMonitor>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawDefaults {
    #[serde(default)]
    pub service: RawService,
    #[serde(default)]
    pub gotify: RawGotify,
    #[serde(default)]
    pub slack: RawSlack,
    #[serde(default)]
    pub webhook: RawWebhook,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawMonitor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub service: OneOrMany<RawService>,
    #[serde(default)]
    pub gotify: OneOrMany<RawGotify>,
    #[serde(default)]
    pub slack: OneOrMany<RawSlack>,
    #[serde(default)]
    pub webhook: OneOrMany<RawWebhook>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawService {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub url_commands: OneOrMany<RawUrlCommand>,
    pub interval: Option<RawDuration>,
    pub progressive_versioning: Option<RawBool>,
    pub regex_content: Option<String>,
    pub regex_version: Option<String>,
    pub skip_gotify: Option<RawBool>,
    pub skip_slack: Option<RawBool>,
    pub skip_webhook: Option<RawBool>,
    #[serde(rename = "ignore_misses")]
    pub ignore_miss: Option<RawBool>,
    pub access_token: Option<String>,
    #[serde(rename = "allow_invalid")]
    pub allow_invalid_certs: Option<RawBool>,
    pub gotify: Option<RawPushOverride>,
    pub slack: Option<RawChatOverride>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawPushOverride {
    pub title: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawChatOverride {
    pub username: Option<String>,
    pub message: Option<String>,
    pub icon_emoji: Option<String>,
    pub icon_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawUrlCommand {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub regex: Option<String>,
    pub index: Option<i64>,
    pub old: Option<String>,
    pub new: Option<String>,
    pub text: Option<String>,
    #[serde(rename = "ignore_misses")]
    pub ignore_miss: Option<RawBool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawGotify {
    pub url: Option<String>,
    pub token: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub priority: Option<RawPriority>,
    pub extras: Option<RawGotifyExtras>,
    pub delay: Option<RawDuration>,
    pub max_tries: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawGotifyExtras {
    pub android_action: Option<String>,
    pub client_display: Option<String>,
    pub client_notification: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawSlack {
    pub url: Option<String>,
    pub icon_emoji: Option<String>,
    pub icon_url: Option<String>,
    pub username: Option<String>,
    pub message: Option<String>,
    pub delay: Option<RawDuration>,
    pub max_tries: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawWebhook {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    pub secret: Option<String>,
    pub desired_status_code: Option<u16>,
    pub delay: Option<RawDuration>,
    pub max_tries: Option<u32>,
    pub silent_fails: Option<RawBool>,
}
