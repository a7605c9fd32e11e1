use std::fmt::Write as _;

use super::entry::{REFERER_MARKER, StreamEntry, USER_AGENT_MARKER};

pub const PLAYLIST_HEADER: &str = "#EXTM3U";

/// Serializes entries back into `#EXTINF` + URL pairs, re-attaching inline header overrides
pub fn write_playlist<'a>(entries: impl IntoIterator<Item = &'a StreamEntry>) -> String {
    let mut out = String::from(PLAYLIST_HEADER);
    out.push('\n');

    for entry in entries {
        out.push_str(&metadata_line(entry));
        out.push('\n');
        out.push_str(&url_line(entry));
        out.push('\n');
    }

    out
}

#[must_use]
pub fn metadata_line(entry: &StreamEntry) -> String {
    let mut line = format!("#EXTINF:{}", entry.duration);
    if let Some(logo) = &entry.logo {
        let _ = write!(line, " tvg-logo=\"{logo}\"");
    }
    if let Some(group) = &entry.group {
        let _ = write!(line, " group-title=\"{group}\"");
    }
    let _ = write!(line, ",{}", entry.name);
    line
}

#[must_use]
pub fn url_line(entry: &StreamEntry) -> String {
    let mut line = entry.url.clone();
    if let Some(referer) = &entry.referer {
        line.push_str(REFERER_MARKER);
        line.push_str(referer);
    }
    if let Some(user_agent) = &entry.user_agent {
        line.push_str(USER_AGENT_MARKER);
        line.push_str(user_agent);
    }
    line
}
