use std::{
    sync::LazyLock,
    time::{Duration, Instant},
};

use regex::Regex;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, REFERER, USER_AGENT};
use tracing::{debug, instrument};

use crate::playlist::entry::StreamEntry;
use fetch::{Fetch, FetchRequest};
use structs::{ProbeResult, StatusKind};

pub mod fetch;
pub mod structs;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Classification only looks at this many bytes of the body
pub const PREFIX_BYTES: usize = 1024;

pub const PLAYLIST_MAGIC: &str = "#EXTM3U";
pub const PLAYLIST_CONTENT_TYPES: [&str; 4] = [
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

static SEGMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.ts\b").unwrap());

#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub timeout: Duration,
    /// Sent unless the entry carries its own `|User-Agent=` override
    pub user_agent: String,
    pub max_bytes: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_bytes: PREFIX_BYTES,
        }
    }
}

/// Checks a single stream. Never fails: transport problems end up in the returned result.
#[instrument(skip_all, fields(name = %entry.name, url = %entry.url))]
pub async fn probe<F: Fetch>(fetcher: &F, entry: StreamEntry, options: &ProbeOptions) -> ProbeResult {
    let started = Instant::now();

    let headers = match build_headers(&entry, &options.user_agent) {
        Ok(h) => h,
        Err(e) => {
            return ProbeResult {
                entry,
                status: StatusKind::Error,
                http_status: None,
                segment_count: None,
                error_detail: Some(format!("Invalid request header: {e}")),
                elapsed_ms: elapsed_ms(started),
            };
        }
    };

    let response = fetcher
        .fetch(FetchRequest {
            url: &entry.url,
            headers,
            timeout: options.timeout,
            max_bytes: options.max_bytes,
        })
        .await;

    let (status, http_status, segment_count, error_detail) = match response {
        Err(e) => {
            debug!("Transport failure: {e}");
            let status = if e.is_unreachable() {
                StatusKind::Down
            } else {
                StatusKind::Error
            };
            (status, None, None, Some(e.to_string()))
        }
        Ok(res) if res.status != 200 => (StatusKind::Down, Some(res.status), None, None),
        Ok(res) => {
            let content_type = res
                .headers
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let (status, segment_count) = classify(content_type, &res.body_prefix);
            (status, Some(res.status), segment_count, None)
        }
    };

    ProbeResult {
        entry,
        status,
        http_status,
        segment_count,
        error_detail,
        elapsed_ms: elapsed_ms(started),
    }
}

/// Default user agent overridden by the entry's own, plus its referer when present
///
/// # Errors
/// Errors when an override cannot be encoded as a header value
pub fn build_headers(
    entry: &StreamEntry,
    default_user_agent: &str,
) -> Result<HeaderMap, reqwest::header::InvalidHeaderValue> {
    let mut headers = HeaderMap::new();
    let user_agent = entry.user_agent.as_deref().unwrap_or(default_user_agent);
    headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
    if let Some(referer) = &entry.referer {
        headers.insert(REFERER, HeaderValue::from_str(referer)?);
    }
    Ok(headers)
}

/// Classifies a `200 OK` response from its content type and body prefix.
///
/// Segment counts only cover the prefix, so long playlists are undercounted.
#[must_use]
pub fn classify(content_type: Option<&str>, body_prefix: &[u8]) -> (StatusKind, Option<usize>) {
    let body = String::from_utf8_lossy(body_prefix);

    let playlist_mime = content_type.is_some_and(|ct| {
        let essence = ct.split(';').next().unwrap_or_default().trim();
        PLAYLIST_CONTENT_TYPES
            .iter()
            .any(|known| essence.eq_ignore_ascii_case(known))
    });
    let playlist_magic = body.trim_start_matches('\u{feff}').starts_with(PLAYLIST_MAGIC);

    if !(playlist_mime || playlist_magic) {
        return (StatusKind::LiveNotPlaylist, None);
    }

    let segments = SEGMENT_REGEX.find_iter(&body).count();
    let status = if segments > 0 {
        StatusKind::Live
    } else {
        StatusKind::LiveNoSegments
    };
    (status, Some(segments))
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
