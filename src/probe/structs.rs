use std::fmt;

use serde::{Deserialize, Serialize};

use crate::playlist::entry::StreamEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Playlist body with at least one segment reference
    Live,
    LiveNoSegments,
    /// Reachable, but the body is not an M3U playlist
    LiveNotPlaylist,
    Down,
    Error,
}

impl StatusKind {
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(
            self,
            Self::Live | Self::LiveNoSegments | Self::LiveNotPlaylist
        )
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Live => "Live",
            Self::LiveNoSegments => "Live (No segments)",
            Self::LiveNotPlaylist => "Live (Not M3U8)",
            Self::Down => "Down",
            Self::Error => "Error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub entry: StreamEntry,
    pub status: StatusKind,
    pub http_status: Option<u16>,
    pub segment_count: Option<usize>,
    pub error_detail: Option<String>,
    pub elapsed_ms: u64,
}

impl ProbeResult {
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Status with its HTTP code or segment count, e.g. `Down (Status: 404)`
    #[must_use]
    pub fn status_line(&self) -> String {
        match (self.status, self.http_status, self.segment_count) {
            (StatusKind::Down, Some(code), _) => format!("Down (Status: {code})"),
            (status, _, Some(segments)) => format!("{status} (Segments: {segments})"),
            (status, _, None) => status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: StatusKind, http_status: Option<u16>, segment_count: Option<usize>) -> ProbeResult {
        ProbeResult {
            entry: StreamEntry {
                name: "X".to_string(),
                url: "http://a/x".to_string(),
                referer: None,
                user_agent: None,
                logo: None,
                group: None,
                duration: "-1".to_string(),
            },
            status,
            http_status,
            segment_count,
            error_detail: None,
            elapsed_ms: 0,
        }
    }

    #[test]
    fn live_statuses() {
        assert!(StatusKind::Live.is_live());
        assert!(StatusKind::LiveNoSegments.is_live());
        assert!(StatusKind::LiveNotPlaylist.is_live());
        assert!(!StatusKind::Down.is_live());
        assert!(!StatusKind::Error.is_live());
    }

    #[test]
    fn status_lines() {
        assert_eq!(result(StatusKind::Down, Some(404), None).status_line(), "Down (Status: 404)");
        assert_eq!(result(StatusKind::Down, None, None).status_line(), "Down");
        assert_eq!(result(StatusKind::Live, Some(200), Some(3)).status_line(), "Live (Segments: 3)");
        assert_eq!(
            result(StatusKind::LiveNoSegments, Some(200), Some(0)).status_line(),
            "Live (No segments) (Segments: 0)"
        );
        assert_eq!(
            result(StatusKind::LiveNotPlaylist, Some(200), None).status_line(),
            "Live (Not M3U8)"
        );
    }
}
