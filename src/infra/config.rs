//! Loads the YAML config and resolves it into the strict domain model:
//! defaults merged, ids derived, forge URLs canonicalised, durations and
//! priorities validated.
pub mod raw;

use std::path::Path;
use std::time::Duration;

use regex::Regex;
use tokio::fs;

use crate::domain::commands::UrlCommand;
use crate::domain::model::{
    AppConfig, ChatOverride, GotifyExtras, GotifyRecipient, Monitor, PushOverride, Service,
    ServiceKind, SlackRecipient, WebhookKind, WebhookRecipient,
};
use self::raw::{
    OneOrMany, RawBool, RawConfig, RawDefaults, RawDuration, RawGotify, RawMonitor, RawPriority,
    RawService, RawSlack, RawUrlCommand, RawWebhook,
};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);
const DEFAULT_MAX_TRIES: u32 = 3;
const DEFAULT_SLACK_MESSAGE: &str = "<${service_url}|${service_id}> - ${version} released";
const DEFAULT_GOTIFY_MESSAGE: &str = "${service_id} - ${version} released";
const DEFAULT_USERNAME: &str = "Release Watcher";
const DEFAULT_ICON_EMOJI: &str = ":github:";
const DEFAULT_PRIORITY: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub async fn load(path: &Path) -> Result<AppConfig, ConfigError> {
        let content = fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<AppConfig, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        resolve(raw)
    }
}

fn resolve(raw: RawConfig) -> Result<AppConfig, ConfigError> {
    let defaults = raw.defaults;
    let mut monitors = Vec::new();
    for (mi, m) in raw.monitor.into_vec().into_iter().enumerate() {
        monitors.push(resolve_monitor(m, &defaults, mi)?);
    }
    Ok(AppConfig { monitors })
}

fn resolve_monitor(
    raw: RawMonitor,
    defaults: &RawDefaults,
    index: usize,
) -> Result<Monitor, ConfigError> {
    let id = if raw.id.is_empty() {
        format!("monitor[{index}]")
    } else {
        raw.id
    };

    let services = resolve_list(raw.service, |i, s| {
        resolve_service(s, defaults, &format!("{id}.service[{i}]"))
    })?;
    let gotify = resolve_list(raw.gotify, |i, g| {
        resolve_gotify(g, &defaults.gotify, &format!("{id}.gotify[{i}]"))
    })?;
    let slack = resolve_list(raw.slack, |i, s| {
        resolve_slack(s, &defaults.slack, &format!("{id}.slack[{i}]"))
    })?;
    let webhooks = resolve_list(raw.webhook, |i, w| {
        resolve_webhook(w, &defaults.webhook, &format!("{id}.webhook[{i}]"))
    })?;

    Ok(Monitor {
        id,
        services,
        gotify,
        slack,
        webhooks,
    })
}

fn resolve_list<R, T>(
    raw: OneOrMany<R>,
    mut f: impl FnMut(usize, R) -> Result<T, ConfigError>,
) -> Result<Vec<T>, ConfigError> {
    raw.into_vec()
        .into_iter()
        .enumerate()
        .map(|(i, r)| f(i, r))
        .collect()
}

fn resolve_service(
    raw: RawService,
    defaults: &RawDefaults,
    target: &str,
) -> Result<Service, ConfigError> {
    let url = raw
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::Invalid(format!("{target}.url is required")))?;

    let kind = match raw.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("github") => ServiceKind::Github,
        Some("url") => ServiceKind::Url,
        None => {
            // An `owner/repo` shorthand is a forge service.
            if url.matches('/').count() == 1 {
                ServiceKind::Github
            } else {
                ServiceKind::Url
            }
        }
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "{target}.type '{other}' is invalid, expected 'github' or 'url'"
            )))
        }
    };

    let id = match raw.id.filter(|i| !i.is_empty()) {
        Some(id) => id,
        None => derive_service_id(kind, &url),
    };

    let url = match kind {
        ServiceKind::Github => canonicalize_github_url(&url, target)?,
        ServiceKind::Url => url,
    };

    let interval = resolve_duration(
        raw.interval.or(defaults.service.interval.clone()),
        DEFAULT_INTERVAL,
        target,
        "interval",
    )?;
    if interval.is_zero() {
        return Err(ConfigError::Invalid(format!(
            "{target}.interval must be a positive duration"
        )));
    }

    let ignore_miss = resolve_bool(
        raw.ignore_miss.as_ref().or(defaults.service.ignore_miss.as_ref()),
        false,
    );
    let commands = resolve_list(raw.url_commands, |i, c| {
        resolve_command(c, ignore_miss, &format!("{target}.url_commands[{i}]"))
    })?;

    let regex_version = raw.regex_version.filter(|r| !r.is_empty());
    if let Some(rv) = &regex_version {
        Regex::new(rv).map_err(|e| {
            ConfigError::Invalid(format!("{target}.regex_version '{rv}' is invalid: {e}"))
        })?;
    }

    Ok(Service {
        id,
        kind,
        url,
        commands,
        interval,
        progressive_versioning: resolve_bool(
            raw.progressive_versioning
                .as_ref()
                .or(defaults.service.progressive_versioning.as_ref()),
            true,
        ),
        // Not compile-checked here: the pattern may contain `${version}`
        // placeholders that only substitute at query time.
        regex_content: raw.regex_content.filter(|r| !r.is_empty()),
        regex_version,
        access_token: raw
            .access_token
            .or_else(|| defaults.service.access_token.clone())
            .filter(|t| !t.is_empty()),
        allow_invalid_certs: resolve_bool(
            raw.allow_invalid_certs
                .as_ref()
                .or(defaults.service.allow_invalid_certs.as_ref()),
            false,
        ),
        skip_gotify: resolve_bool(raw.skip_gotify.as_ref(), false),
        skip_slack: resolve_bool(raw.skip_slack.as_ref(), false),
        skip_webhook: resolve_bool(raw.skip_webhook.as_ref(), false),
        gotify: match raw.gotify {
            Some(o) => PushOverride {
                title: o.title.filter(|s| !s.is_empty()),
                message: o.message.filter(|s| !s.is_empty()),
            },
            None => PushOverride::default(),
        },
        slack: match raw.slack {
            Some(o) => ChatOverride {
                username: o.username.filter(|s| !s.is_empty()),
                message: o.message.filter(|s| !s.is_empty()),
                icon_emoji: o.icon_emoji.filter(|s| !s.is_empty()),
                icon_url: o.icon_url.filter(|s| !s.is_empty()),
            },
            None => ChatOverride::default(),
        },
    })
}

fn resolve_command(
    raw: RawUrlCommand,
    default_ignore_miss: bool,
    target: &str,
) -> Result<UrlCommand, ConfigError> {
    let ignore_miss = resolve_bool(raw.ignore_miss.as_ref(), default_ignore_miss);
    let index = raw.index.unwrap_or(0);
    let kind = raw.kind.unwrap_or_default();

    match kind.as_str() {
        "split" => {
            let text = raw
                .text
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ConfigError::Invalid(format!("{target}.text is required")))?;
            Ok(UrlCommand::Split {
                text,
                index,
                ignore_miss,
            })
        }
        "replace" => {
            let old = raw
                .old
                .filter(|o| !o.is_empty())
                .ok_or_else(|| ConfigError::Invalid(format!("{target}.old is required")))?;
            Ok(UrlCommand::Replace {
                old,
                new: raw.new.unwrap_or_default(),
                ignore_miss,
            })
        }
        "regex" | "regex_submatch" => {
            let pattern = raw
                .regex
                .filter(|r| !r.is_empty())
                .ok_or_else(|| ConfigError::Invalid(format!("{target}.regex is required")))?;
            let pattern = Regex::new(&pattern).map_err(|e| {
                ConfigError::Invalid(format!("{target}.regex '{pattern}' is invalid: {e}"))
            })?;
            if kind == "regex" {
                Ok(UrlCommand::Regex {
                    pattern,
                    index,
                    ignore_miss,
                })
            } else {
                Ok(UrlCommand::RegexSubmatch {
                    pattern,
                    index,
                    ignore_miss,
                })
            }
        }
        other => Err(ConfigError::Invalid(format!(
            "{target}.type '{other}' is an unknown type for url_commands"
        ))),
    }
}

fn resolve_gotify(
    raw: RawGotify,
    defaults: &RawGotify,
    target: &str,
) -> Result<GotifyRecipient, ConfigError> {
    let url = raw
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::Invalid(format!("{target}.url is required")))?;

    let priority = match raw.priority.or_else(|| defaults.priority.clone()) {
        None => DEFAULT_PRIORITY,
        Some(RawPriority::Int(n)) => n,
        Some(RawPriority::Text(s)) => s.trim().parse::<i64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "{target}.priority '{s}' is invalid, it should be an integer"
            ))
        })?,
    };

    let raw_extras = raw.extras.unwrap_or_default();
    let default_extras = defaults.extras.clone().unwrap_or_default();
    let extras = GotifyExtras {
        android_action: raw_extras
            .android_action
            .or(default_extras.android_action)
            .filter(|s| !s.is_empty()),
        client_display: raw_extras
            .client_display
            .or(default_extras.client_display)
            .filter(|s| !s.is_empty()),
        client_notification: raw_extras
            .client_notification
            .or(default_extras.client_notification)
            .filter(|s| !s.is_empty()),
    };

    Ok(GotifyRecipient {
        url,
        token: raw.token.or_else(|| defaults.token.clone()).unwrap_or_default(),
        priority,
        title: first_non_empty(raw.title, defaults.title.clone(), DEFAULT_USERNAME),
        message: first_non_empty(raw.message, defaults.message.clone(), DEFAULT_GOTIFY_MESSAGE),
        extras,
        delay: resolve_duration(
            raw.delay.or_else(|| defaults.delay.clone()),
            Duration::ZERO,
            target,
            "delay",
        )?,
        max_tries: resolve_max_tries(raw.max_tries.or(defaults.max_tries), target)?,
    })
}

fn resolve_slack(
    raw: RawSlack,
    defaults: &RawSlack,
    target: &str,
) -> Result<SlackRecipient, ConfigError> {
    let url = raw
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::Invalid(format!("{target}.url is required")))?;

    // Icon defaults apply as a pair: a recipient that sets either icon takes
    // neither default.
    let (mut icon_emoji, mut icon_url) = match (&raw.icon_emoji, &raw.icon_url) {
        (None, None) => (defaults.icon_emoji.clone(), defaults.icon_url.clone()),
        _ => (raw.icon_emoji, raw.icon_url),
    };
    icon_emoji = icon_emoji.filter(|s| !s.is_empty());
    icon_url = icon_url.filter(|s| !s.is_empty());
    if icon_emoji.is_none() && icon_url.is_none() {
        icon_emoji = Some(DEFAULT_ICON_EMOJI.to_string());
    }

    Ok(SlackRecipient {
        url,
        icon_emoji,
        icon_url,
        username: first_non_empty(raw.username, defaults.username.clone(), DEFAULT_USERNAME),
        message: first_non_empty(raw.message, defaults.message.clone(), DEFAULT_SLACK_MESSAGE),
        delay: resolve_duration(
            raw.delay.or_else(|| defaults.delay.clone()),
            Duration::ZERO,
            target,
            "delay",
        )?,
        max_tries: resolve_max_tries(raw.max_tries.or(defaults.max_tries), target)?,
    })
}

fn resolve_webhook(
    raw: RawWebhook,
    defaults: &RawWebhook,
    target: &str,
) -> Result<WebhookRecipient, ConfigError> {
    let url = raw
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::Invalid(format!("{target}.url is required")))?;

    let kind = match raw.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("github") => WebhookKind::Github,
        Some("url") => WebhookKind::Url,
        Some(other) => {
            return Err(ConfigError::Invalid(format!(
                "{target}.type '{other}' is invalid, expected 'github' or 'url'"
            )))
        }
    };

    Ok(WebhookRecipient {
        kind,
        url,
        secret: raw.secret.or_else(|| defaults.secret.clone()).unwrap_or_default(),
        desired_status_code: raw
            .desired_status_code
            .or(defaults.desired_status_code)
            .unwrap_or(0),
        delay: resolve_duration(
            raw.delay.or_else(|| defaults.delay.clone()),
            Duration::ZERO,
            target,
            "delay",
        )?,
        max_tries: resolve_max_tries(raw.max_tries.or(defaults.max_tries), target)?,
        silent_fails: resolve_bool(
            raw.silent_fails.as_ref().or(defaults.silent_fails.as_ref()),
            false,
        ),
    })
}

fn resolve_bool(raw: Option<&RawBool>, default: bool) -> bool {
    raw.map(RawBool::as_bool).unwrap_or(default)
}

fn first_non_empty(a: Option<String>, b: Option<String>, fallback: &str) -> String {
    a.filter(|s| !s.is_empty())
        .or_else(|| b.filter(|s| !s.is_empty()))
        .unwrap_or_else(|| fallback.to_string())
}

fn resolve_max_tries(raw: Option<u32>, target: &str) -> Result<u32, ConfigError> {
    match raw {
        None => Ok(DEFAULT_MAX_TRIES),
        Some(0) => Err(ConfigError::Invalid(format!(
            "{target}.max_tries must be at least 1"
        ))),
        Some(n) => Ok(n),
    }
}

fn resolve_duration(
    raw: Option<RawDuration>,
    default: Duration,
    target: &str,
    field: &str,
) -> Result<Duration, ConfigError> {
    match raw {
        None => Ok(default),
        Some(RawDuration::Seconds(n)) => Ok(Duration::from_secs(n)),
        Some(RawDuration::Text(s)) => parse_duration(&s).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "{target}.{field} '{s}' is invalid (Use 'AhBmCs' duration format)"
            ))
        }),
    }
}

/// Parses `AhBmCs` (any subset, in order) or a bare integer meaning seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    if t.bytes().all(|b| b.is_ascii_digit()) {
        return Some(Duration::from_secs(t.parse().ok()?));
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut any_unit = false;
    for c in t.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else {
            if digits.is_empty() {
                return None;
            }
            let n: u64 = digits.parse().ok()?;
            digits.clear();
            let mult = match c {
                'h' => 3600,
                'm' => 60,
                's' => 1,
                _ => return None,
            };
            total = total.checked_add(n.checked_mul(mult)?)?;
            any_unit = true;
        }
    }
    if !digits.is_empty() || !any_unit {
        return None;
    }
    Some(Duration::from_secs(total))
}

fn derive_service_id(kind: ServiceKind, url: &str) -> String {
    match kind {
        ServiceKind::Github => {
            if url.matches('/').count() == 1 {
                url.to_string()
            } else {
                owner_repo(url).unwrap_or_else(|| url.to_string())
            }
        }
        ServiceKind::Url => {
            if url.contains("github.com/") {
                owner_repo(url).unwrap_or_else(|| url.to_string())
            } else {
                // e.g. https://releases.test.com/app -> "releases"
                let rest = url.split("://").nth(1).unwrap_or(url);
                let host = rest.split('/').next().unwrap_or(rest);
                host.split('.').next().unwrap_or(host).to_string()
            }
        }
    }
}

// "owner/repo" out of any github.com (or api.github.com/repos) URL.
fn owner_repo(url: &str) -> Option<String> {
    let after = url.splitn(2, ".com/").nth(1)?;
    let after = after.strip_prefix("repos/").unwrap_or(after);
    let mut segs = after.split('/');
    match (segs.next(), segs.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Some(format!("{owner}/{repo}"))
        }
        _ => None,
    }
}

fn canonicalize_github_url(url: &str, target: &str) -> Result<String, ConfigError> {
    if url.matches('/').count() == 1 {
        return Ok(format!(
            "https://api.github.com/repos/{url}/releases/latest"
        ));
    }
    if url.contains("api.github") {
        return Ok(url.to_string());
    }
    let pair = owner_repo(url).ok_or_else(|| {
        ConfigError::Invalid(format!(
            "{target}.url '{url}' is not an 'owner/repo' or github.com repository URL"
        ))
    })?;
    Ok(format!(
        "https://api.github.com/repos/{pair}/releases/latest"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_integer_duration_is_seconds() {
        assert_eq!(parse_duration("30"), Some(Duration::from_secs(30)));
    }

    #[test]
    fn composite_duration_parses() {
        assert_eq!(
            parse_duration("1h30m15s"),
            Some(Duration::from_secs(3600 + 30 * 60 + 15))
        );
        assert_eq!(parse_duration("10m"), Some(Duration::from_secs(600)));
    }

    #[test]
    fn malformed_durations_are_rejected() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("5x"), None);
        assert_eq!(parse_duration("5s3"), None);
    }

    #[test]
    fn owner_repo_handles_api_and_web_urls() {
        assert_eq!(
            owner_repo("https://github.com/go-gitea/gitea"),
            Some("go-gitea/gitea".to_string())
        );
        assert_eq!(
            owner_repo("https://api.github.com/repos/go-gitea/gitea/releases/latest"),
            Some("go-gitea/gitea".to_string())
        );
        assert_eq!(owner_repo("https://example.com/"), None);
    }
}
