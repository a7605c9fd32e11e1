use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, warn};

use super::entry::{StreamEntry, UNKNOWN_NAME, split_url_line};

pub const METADATA_MARKER: &str = "#EXTINF:";
const DEFAULT_DURATION: &str = "-1";

static ATTRIBUTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).unwrap());

static DURATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").unwrap());

/// Recoverable problem found while parsing a playlist. The offending line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseWarning {
    #[error("line {line}: malformed #EXTINF metadata `{text}`")]
    MalformedMetadata { line: usize, text: String },
    #[error("line {line}: invalid stream URL `{url}`")]
    InvalidUrl { line: usize, url: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct PendingMetadata {
    name: String,
    duration: String,
    logo: Option<String>,
    group: Option<String>,
}

#[derive(Debug, Default)]
enum ParserState {
    #[default]
    AwaitingMetadata,
    MetadataPending(PendingMetadata),
}

/// Parses playlist text into stream entries, logging every skipped line
pub fn parse(text: &str) -> Vec<StreamEntry> {
    let (entries, warnings) = parse_with_warnings(text);
    for warning in &warnings {
        warn!("Skipping playlist line: {warning}");
    }
    entries
}

/// Parses playlist text into stream entries and returns the skipped lines alongside them.
///
/// Never fails: malformed metadata is dropped and invalid URL lines produce no entry.
#[must_use]
pub fn parse_with_warnings(text: &str) -> (Vec<StreamEntry>, Vec<ParseWarning>) {
    let mut entries = Vec::new();
    let mut warnings = Vec::new();
    let mut state = ParserState::AwaitingMetadata;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim_start_matches('\u{feff}').trim();
        if line.is_empty() {
            continue;
        }

        if let Some(metadata) = line.strip_prefix(METADATA_MARKER) {
            if let ParserState::MetadataPending(previous) = &state {
                debug!("Metadata for `{}` has no stream URL, discarding", previous.name);
            }
            state = match parse_metadata(metadata) {
                Some(pending) => ParserState::MetadataPending(pending),
                None => {
                    warnings.push(ParseWarning::MalformedMetadata {
                        line: line_no,
                        text: line.to_string(),
                    });
                    ParserState::AwaitingMetadata
                }
            };
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        let pending = match std::mem::take(&mut state) {
            ParserState::MetadataPending(pending) => Some(pending),
            ParserState::AwaitingMetadata => None,
        };

        let url_line = split_url_line(line);
        if !is_valid_stream_url(url_line.url) {
            warnings.push(ParseWarning::InvalidUrl {
                line: line_no,
                url: url_line.url.to_string(),
            });
            continue;
        }

        let pending = pending.unwrap_or_else(|| PendingMetadata {
            name: UNKNOWN_NAME.to_string(),
            duration: DEFAULT_DURATION.to_string(),
            ..PendingMetadata::default()
        });

        entries.push(StreamEntry {
            name: pending.name,
            url: url_line.url.to_string(),
            referer: url_line.referer.map(str::to_string),
            user_agent: url_line.user_agent.map(str::to_string),
            logo: pending.logo,
            group: pending.group,
            duration: pending.duration,
        });
    }

    if let ParserState::MetadataPending(pending) = state {
        debug!("Trailing metadata for `{}` has no stream URL, discarding", pending.name);
    }

    (entries, warnings)
}

/// Parses everything after `#EXTINF:`. Returns `None` when the duration is not a number.
fn parse_metadata(metadata: &str) -> Option<PendingMetadata> {
    let duration_end = metadata
        .find(|c: char| c.is_whitespace() || c == ',')
        .unwrap_or(metadata.len());
    let duration = &metadata[..duration_end];
    if !DURATION_REGEX.is_match(duration) {
        return None;
    }

    let rest = &metadata[duration_end..];
    let (attributes, name) = match find_name_separator(rest) {
        Some(comma) => (&rest[..comma], rest[comma + 1..].trim()),
        None => (rest, ""),
    };

    let mut attributes = parse_attributes(attributes);

    Some(PendingMetadata {
        name: if name.is_empty() {
            UNKNOWN_NAME.to_string()
        } else {
            name.to_string()
        },
        duration: duration.to_string(),
        logo: attributes.remove("tvg-logo"),
        group: attributes.remove("group-title"),
    })
}

/// Position of the last comma that is outside every `key="value"` pair and not escaped with a backslash
fn find_name_separator(text: &str) -> Option<usize> {
    let attribute_spans: Vec<_> = ATTRIBUTE_REGEX.find_iter(text).map(|m| m.range()).collect();
    let mut separator = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if attribute_spans.iter().any(|span| span.contains(&i)) {
            escaped = false;
            continue;
        }
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            ',' => separator = Some(i),
            _ => {}
        }
    }

    separator
}

fn parse_attributes(text: &str) -> HashMap<String, String> {
    ATTRIBUTE_REGEX
        .captures_iter(text)
        .map(|c| (c[1].to_ascii_lowercase(), c[2].to_string()))
        .collect()
}

fn is_valid_stream_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| !u.scheme().is_empty() && u.host_str().is_some_and(|h| !h.is_empty()))
}
