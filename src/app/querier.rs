//! One poll cycle for one service: fetch, extract, filter, decide.
//!
//! Every failure short of misconfiguration translates to "no transition this
//! cycle"; the tracker keeps looping. Misconfiguration discovered here
//! (invalid forge credentials, a first version that cannot seed progressive
//! comparisons) is fatal to the process.
use regex::Regex;
use semver::Version;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::commands;
use crate::domain::model::{HttpErrorKind, Service, ServiceKind, ServiceStatus};
use crate::domain::template;
use crate::ports::http::Http;

/// Upstream bodies smaller than this are checked for forge error markers
/// before tag extraction.
const SMALL_BODY_BYTES: usize = 500;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct FatalQuery(pub String);

/// Polls `service` once. `Ok(true)` means a new release was accepted and
/// `status.version` now holds it.
pub async fn query<H: Http + ?Sized>(
    http: &H,
    service: &Service,
    monitor_id: &str,
    status: &mut ServiceStatus,
) -> Result<bool, FatalQuery> {
    let res = http
        .get(
            &service.url,
            service.access_token.as_deref(),
            service.allow_invalid_certs,
        )
        .await;

    if let Some(err) = &res.error {
        if err.kind == HttpErrorKind::Tls {
            warn!(service = %service.id, monitor = %monitor_id, "Upstream certificate invalid");
        } else {
            error!(service = %service.id, monitor = %monitor_id, error = %err.message, "Query failed");
        }
        return Ok(false);
    }
    let body = match res.body {
        Some(b) => b,
        None => {
            error!(service = %service.id, monitor = %monitor_id, "Query returned no body");
            return Ok(false);
        }
    };

    let seed = match service.kind {
        ServiceKind::Github => {
            if body.len() < SMALL_BODY_BYTES {
                if body.contains("Bad credentials") {
                    return Err(FatalQuery(format!(
                        "{} ({monitor_id}): the forge access token is invalid",
                        service.id
                    )));
                }
                if body.contains("rate limit") {
                    warn!(service = %service.id, monitor = %monitor_id, "Rate limit reached");
                    return Ok(false);
                }
            }
            match extract_forge_tag(&body) {
                Some(tag) => tag,
                None => {
                    error!(
                        service = %service.id,
                        monitor = %monitor_id,
                        url = %service.url,
                        "tag_name not found in response"
                    );
                    return Ok(false);
                }
            }
        }
        ServiceKind::Url => body.clone(),
    };

    let version = match commands::run(
        &service.commands,
        &seed,
        &service.id,
        monitor_id,
        &mut status.miss_mask,
    ) {
        Ok(v) => v,
        Err(e) => {
            debug!(service = %service.id, monitor = %monitor_id, error = %e, "Extraction aborted");
            return Ok(false);
        }
    };

    if version == status.version {
        return Ok(false);
    }

    if service.progressive_versioning
        && !status.version.is_empty()
        && regresses(&status.version, &version, &service.id, monitor_id)
    {
        return Ok(false);
    }

    if let Some(pattern) = &service.regex_content {
        let rendered = template::render_content_pattern(pattern, &version);
        match Regex::new(&rendered) {
            Ok(re) => {
                if !re.is_match(&body) {
                    status.content_regex_misses += 1;
                    if status.content_regex_misses == 1 {
                        debug!(
                            service = %service.id,
                            monitor = %monitor_id,
                            version = %version,
                            "Regex not matched on content"
                        );
                    }
                    return Ok(false);
                }
            }
            Err(e) => {
                error!(service = %service.id, monitor = %monitor_id, error = %e, "regex_content did not compile");
                return Ok(false);
            }
        }
    }

    if let Some(pattern) = &service.regex_version {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(&version) {
                    status.version_regex_misses += 1;
                    if status.version_regex_misses == 1 {
                        debug!(
                            service = %service.id,
                            monitor = %monitor_id,
                            version = %version,
                            "Regex not matched on version"
                        );
                    }
                    return Ok(false);
                }
            }
            Err(e) => {
                error!(service = %service.id, monitor = %monitor_id, error = %e, "regex_version did not compile");
                return Ok(false);
            }
        }
    }

    // A version made it through the filters: re-arm the once-per-streak logs.
    status.content_regex_misses = 0;
    status.version_regex_misses = 0;

    if status.version.is_empty() {
        if service.progressive_versioning && Version::parse(&version).is_err() {
            return Err(FatalQuery(format!(
                "{} ({monitor_id}): failed converting '{version}' to a semantic version. If all \
                 versions are in this style, consider adding url_commands to transform it into \
                 '1.2.3' form, or disabling progressive versioning for this service",
                service.id
            )));
        }
        status.version = version.clone();
        info!(service = %service.id, monitor = %monitor_id, version = %version, "Starting Release");
        return Ok(false);
    }

    status.version = version.clone();
    info!(service = %service.id, monitor = %monitor_id, version = %version, "New Release");
    Ok(true)
}

/// True only when both versions parse as semver and the new one is strictly
/// older. A side that fails to parse logs an error and fails open.
fn regresses(old: &str, new: &str, service_id: &str, monitor_id: &str) -> bool {
    let old_v = Version::parse(old);
    if old_v.is_err() {
        error!(
            service = %service_id,
            monitor = %monitor_id,
            version = %old,
            "failed converting to a semantic version"
        );
    }
    let new_v = Version::parse(new);
    if new_v.is_err() {
        error!(
            service = %service_id,
            monitor = %monitor_id,
            version = %new,
            "failed converting to a semantic version"
        );
    }
    match (old_v, new_v) {
        (Ok(o), Ok(n)) => n < o,
        _ => false,
    }
}

/// The value of the first `"tag_name"` field: the quoted token between the
/// marker and the following comma.
fn extract_forge_tag(body: &str) -> Option<String> {
    let after = body.splitn(2, "\"tag_name\"").nth(1)?;
    let until_comma = after.split(',').next().unwrap_or(after);
    let tag = until_comma.splitn(3, '"').nth(1)?;
    Some(tag.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forge_tag_between_marker_and_comma() {
        let body = r#"{"url":"x","tag_name":"v1.14.2","name":"1.14.2"}"#;
        assert_eq!(extract_forge_tag(body), Some("v1.14.2".to_string()));
    }

    #[test]
    fn forge_tag_as_last_field() {
        let body = r#"{"tag_name":"v2.0.0"}"#;
        assert_eq!(extract_forge_tag(body), Some("v2.0.0".to_string()));
    }

    #[test]
    fn missing_forge_tag_is_none() {
        assert_eq!(extract_forge_tag(r#"{"message":"Not Found"}"#), None);
    }
}
