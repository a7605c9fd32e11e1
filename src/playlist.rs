use std::time::Duration;

use anyhow::{Context, Result, ensure};
use reqwest::{StatusCode, Url};
use tracing::{info, instrument};

pub mod entry;
pub mod parser;
pub mod writer;

/// Loads the raw playlist text from an `http(s)` URL or a local file path
///
/// # Errors
/// Errors on network failure, non-200 responses or unreadable files.
/// Any of these is fatal for the run. Bytes that are not valid UTF-8 are replaced, not rejected.
#[instrument(skip(client, timeout))]
pub async fn load_playlist(
    client: &reqwest::Client,
    source: &str,
    timeout: Duration,
) -> Result<String> {
    match Url::parse(source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            fetch_playlist(client, url, timeout).await
        }
        _ => {
            info!("Reading playlist from file {source}");
            let bytes = tokio::fs::read(source)
                .await
                .context(format!("Reading playlist file {source}"))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}

async fn fetch_playlist(client: &reqwest::Client, url: Url, timeout: Duration) -> Result<String> {
    info!("Fetching playlist from {url}");
    let res = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .context("Fetching playlist")?;

    ensure!(
        res.status() == StatusCode::OK,
        "Failed to fetch playlist: Status {}",
        res.status().as_u16()
    );

    res.text().await.context("Decoding playlist body")
}
