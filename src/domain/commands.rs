//! URL-command engine: an ordered transform program that distills a version
//! token out of a response body.
//!
//! Commands thread a running text value; a command either produces the next
//! text or signals a miss. Misses fall into four classes, each warned at most
//! once per service for the process lifetime (the mask is deliberately never
//! cleared).
use regex::Regex;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

/// One stage of the extraction program.
///
/// Unknown kinds cannot reach this type: the config surface rejects them
/// before resolution.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UrlCommand {
    /// Split on a literal and keep one element.
    Split {
        text: String,
        index: i64,
        ignore_miss: bool,
    },
    /// Replace every occurrence of `old` with `new`. Never misses.
    Replace {
        old: String,
        new: String,
        ignore_miss: bool,
    },
    /// Keep one of all non-overlapping matches.
    Regex {
        #[serde(rename = "regex", serialize_with = "serialize_regex")]
        pattern: Regex,
        index: i64,
        ignore_miss: bool,
    },
    /// Keep the whole first match or one of its capture groups.
    RegexSubmatch {
        #[serde(rename = "regex", serialize_with = "serialize_regex")]
        pattern: Regex,
        index: i64,
        ignore_miss: bool,
    },
}

fn serialize_regex<S: Serializer>(re: &Regex, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(re.as_str())
}

impl UrlCommand {
    pub fn ignore_miss(&self) -> bool {
        match self {
            UrlCommand::Split { ignore_miss, .. }
            | UrlCommand::Replace { ignore_miss, .. }
            | UrlCommand::Regex { ignore_miss, .. }
            | UrlCommand::RegexSubmatch { ignore_miss, .. } => *ignore_miss,
        }
    }
}

/// The four enumerated engine failure modes. The discriminant is the bit
/// position in [`MissMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissClass {
    SplitNoMatch = 0,
    SplitIndexOutOfRange = 1,
    RegexNoMatch = 2,
    RegexIndexOutOfRange = 3,
}

/// Four bits, one per miss class. A bit is set on the first miss of its class
/// and stays set for the service lifetime, gating the warning log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MissMask(u8);

impl MissMask {
    /// Records a miss of `class`; returns true when it is the first one.
    pub fn mark(&mut self, class: MissClass) -> bool {
        let bit = 1u8 << (class as u8);
        let first = self.0 & bit == 0;
        self.0 |= bit;
        first
    }

    pub fn is_set(&self, class: MissClass) -> bool {
        self.0 & (1u8 << (class as u8)) != 0
    }
}

/// A non-ignored miss aborted the program.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExtractionError {
    pub class: MissClass,
    pub message: String,
}

struct Miss {
    class: MissClass,
    message: String,
}

/// Runs the program over `input`.
///
/// On a miss the command's `ignore_miss` decides between restoring the
/// pre-command text and aborting the whole program. First misses of each
/// class are warned through `mask`; repeats are silent.
pub fn run(
    commands: &[UrlCommand],
    input: &str,
    service_id: &str,
    monitor_id: &str,
    mask: &mut MissMask,
) -> Result<String, ExtractionError> {
    let mut text = input.to_string();
    for command in commands {
        debug!(service = %service_id, monitor = %monitor_id, text = %text, "Looking through text");
        match eval(command, &text, service_id, monitor_id) {
            Ok(next) => {
                debug!(service = %service_id, monitor = %monitor_id, resolved = %next, "Command resolved");
                text = next;
            }
            Err(miss) => {
                if mask.mark(miss.class) {
                    warn!(service = %service_id, monitor = %monitor_id, "{}", miss.message);
                }
                if !command.ignore_miss() {
                    return Err(ExtractionError {
                        class: miss.class,
                        message: miss.message,
                    });
                }
                // Ignored: `text` keeps its pre-command value.
            }
        }
    }
    Ok(text)
}

fn eval(
    command: &UrlCommand,
    text: &str,
    service_id: &str,
    monitor_id: &str,
) -> Result<String, Miss> {
    match command {
        UrlCommand::Split {
            text: needle,
            index,
            ..
        } => {
            let parts: Vec<&str> = text.split(needle.as_str()).collect();
            if parts.len() == 1 {
                return Err(Miss {
                    class: MissClass::SplitNoMatch,
                    message: format!("split didn't find any '{needle}' to split on"),
                });
            }
            let norm = normalize_index(parts.len(), *index);
            let idx = in_range(parts.len(), norm).ok_or_else(|| Miss {
                class: MissClass::SplitIndexOutOfRange,
                message: format!(
                    "split ('{needle}') returned {} elements but the index wants element number {}",
                    parts.len(),
                    norm + 1
                ),
            })?;
            Ok(parts[idx].to_string())
        }
        UrlCommand::Replace { old, new, .. } => Ok(text.replace(old.as_str(), new)),
        UrlCommand::Regex { pattern, index, .. } => {
            let matches: Vec<&str> = pattern.find_iter(text).map(|m| m.as_str()).collect();
            pick_match("regex", pattern, &matches, *index)
        }
        UrlCommand::RegexSubmatch { pattern, index, .. } => {
            if *index < 0 {
                warn!(
                    service = %service_id,
                    monitor = %monitor_id,
                    regex = %pattern,
                    "regex_submatch shouldn't use negative indices as the list is always built from the first match"
                );
            }
            let matches: Vec<&str> = match pattern.captures(text) {
                Some(caps) => (0..caps.len())
                    .map(|i| caps.get(i).map(|m| m.as_str()).unwrap_or(""))
                    .collect(),
                None => Vec::new(),
            };
            pick_match("regex_submatch", pattern, &matches, *index)
        }
    }
}

fn pick_match(kind: &str, pattern: &Regex, matches: &[&str], index: i64) -> Result<String, Miss> {
    if matches.is_empty() {
        return Err(Miss {
            class: MissClass::RegexNoMatch,
            message: format!("{kind} ({pattern}) didn't return any matches"),
        });
    }
    let norm = normalize_index(matches.len(), index);
    let idx = in_range(matches.len(), norm).ok_or_else(|| Miss {
        class: MissClass::RegexIndexOutOfRange,
        message: format!(
            "{kind} ({pattern}) returned {} elements but the index wants element number {}",
            matches.len(),
            norm + 1
        ),
    })?;
    Ok(matches[idx].to_string())
}

// Negative indices count from the end.
fn normalize_index(len: usize, index: i64) -> i64 {
    if index < 0 {
        index + len as i64
    } else {
        index
    }
}

// A normalised index that is still negative is out of range, same as one past
// the end.
fn in_range(len: usize, idx: i64) -> Option<usize> {
    if idx < 0 || len as i64 - idx < 1 {
        None
    } else {
        Some(idx as usize)
    }
}
