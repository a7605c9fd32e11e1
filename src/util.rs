use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use rlimit::Resource;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Sockets kept open per in-flight probe, with headroom for redirects and the log/report files
const FILES_PER_WORKER: u64 = 4;

/// Truncates a string to at most `max_chars` characters, adding `...` to the end if it was truncated.
#[must_use]
pub fn truncate_string(string: &str, max_chars: usize) -> String {
    if string.chars().count() <= max_chars {
        return string.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let cut = string
        .char_indices()
        .nth(keep)
        .map_or(string.len(), |(i, _)| i);
    format!("{}...", &string[..cut])
}

/// Warns when the open file limit is too low for the requested number of parallel probes
pub fn warn_ulimit(concurrency: usize) {
    let Ok((limit, _)) = rlimit::getrlimit(Resource::NOFILE) else {
        return;
    };
    let wanted = u64::try_from(concurrency)
        .unwrap_or(u64::MAX)
        .saturating_mul(FILES_PER_WORKER);
    if limit <= wanted {
        warn!(
            "Your file limit ({limit}) is low for {concurrency} parallel probes and some probes may fail to connect. Consider raising it via `ulimit -n {}` or lowering --workers",
            wanted.max(10240)
        );
    }
}

/// Builds the shared HTTP client. `user_agent` is sent unless a request sets its own.
///
/// # Errors
/// Errors when the user agent is not a valid header value or the TLS backend cannot be initialized
pub fn init_http_client(user_agent: &str, connect_timeout: Duration) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).context("Invalid default user agent")?,
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(connect_timeout)
        .build()
        .context("Building HTTP client")
}

/// Spawn a task that watches for CTRL + C signal and cancels a [`CancellationToken`] when caught
pub fn spawn_ct_watcher(ct: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        info!("Caught CTRL+C signal! Stopping probes, no reports will be written");
        ct.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_are_untouched() {
        assert_eq!(truncate_string("BBC One", 60), "BBC One");
        assert_eq!(truncate_string("abc", 3), "abc");
    }

    #[test]
    fn long_strings_get_ellipsis() {
        assert_eq!(truncate_string("abcdefghij", 6), "abc...");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_string("ÄÖÜäöüß", 5), "ÄÖ...");
    }

    #[test]
    fn huge_concurrency_does_not_overflow() {
        warn_ulimit(usize::MAX);
    }

    #[test]
    fn rejects_unencodable_user_agent() {
        assert!(init_http_client("bad\nagent", Duration::from_secs(1)).is_err());
        assert!(init_http_client("m3u-probe/0.1", Duration::from_secs(1)).is_ok());
    }
}
