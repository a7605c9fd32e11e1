use serde::{Deserialize, Serialize};

pub const UNKNOWN_NAME: &str = "Unknown";
pub const MISSING_METADATA: &str = "N/A";

pub const REFERER_MARKER: &str = "|Referer=";
pub const USER_AGENT_MARKER: &str = "|User-Agent=";

/// A single stream reference read from a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEntry {
    pub name: String,
    /// Stream URL exactly as written in the playlist, without inline suffixes
    pub url: String,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub logo: Option<String>,
    pub group: Option<String>,
    /// Raw `#EXTINF` duration token, `-1` when the entry had no metadata line
    pub duration: String,
}

impl StreamEntry {
    #[must_use]
    pub fn logo_or_default(&self) -> &str {
        self.logo.as_deref().unwrap_or(MISSING_METADATA)
    }

    #[must_use]
    pub fn group_or_default(&self) -> &str {
        self.group.as_deref().unwrap_or(MISSING_METADATA)
    }
}

/// URL line split into the stream URL and its inline header overrides
#[derive(Debug, PartialEq, Eq)]
pub struct UrlLine<'a> {
    pub url: &'a str,
    pub referer: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

/// Splits `http://host/x.m3u8|Referer=...|User-Agent=...` into its parts.
///
/// Markers may appear in any order. Each value runs until the next marker or the end of the line.
#[must_use]
pub fn split_url_line(line: &str) -> UrlLine<'_> {
    let referer_at = line.find(REFERER_MARKER);
    let user_agent_at = line.find(USER_AGENT_MARKER);

    let url_end = [referer_at, user_agent_at]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(line.len());

    UrlLine {
        url: line[..url_end].trim(),
        referer: marker_value(line, referer_at, REFERER_MARKER, user_agent_at),
        user_agent: marker_value(line, user_agent_at, USER_AGENT_MARKER, referer_at),
    }
}

fn marker_value<'a>(
    line: &'a str,
    start: Option<usize>,
    marker: &str,
    next_marker: Option<usize>,
) -> Option<&'a str> {
    let start = start?;
    let end = next_marker.filter(|&n| n > start).unwrap_or(line.len());
    Some(&line[start + marker.len()..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_url_has_no_overrides() {
        let line = split_url_line("http://a/x.m3u8");
        assert_eq!(line.url, "http://a/x.m3u8");
        assert_eq!(line.referer, None);
        assert_eq!(line.user_agent, None);
    }

    #[test]
    fn referer_then_user_agent() {
        let line = split_url_line("http://a/x.m3u8|Referer=http://r/|User-Agent=VLC/3.0");
        assert_eq!(line.url, "http://a/x.m3u8");
        assert_eq!(line.referer, Some("http://r/"));
        assert_eq!(line.user_agent, Some("VLC/3.0"));
    }

    #[test]
    fn user_agent_then_referer() {
        let line = split_url_line("http://a/x.m3u8|User-Agent=Mozilla/5.0 (X11)|Referer=http://r");
        assert_eq!(line.url, "http://a/x.m3u8");
        assert_eq!(line.referer, Some("http://r"));
        assert_eq!(line.user_agent, Some("Mozilla/5.0 (X11)"));
    }

    #[test]
    fn metadata_defaults() {
        let entry = StreamEntry {
            name: UNKNOWN_NAME.to_string(),
            url: "http://a".to_string(),
            referer: None,
            user_agent: None,
            logo: None,
            group: Some("News".to_string()),
            duration: "-1".to_string(),
        };
        assert_eq!(entry.logo_or_default(), "N/A");
        assert_eq!(entry.group_or_default(), "News");
    }
}
