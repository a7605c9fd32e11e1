use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{playlist::writer::write_playlist, probe::structs::ProbeResult};

pub mod html;
pub mod markdown;
pub mod text;

pub const REPORT_TITLE: &str = "HLS Stream Check Report";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ReportFormat {
    Text,
    Markdown,
    Html,
    /// Playlist containing only the live entries
    M3u,
    Json,
}

impl ReportFormat {
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [Self::Text, Self::Markdown, Self::Html, Self::M3u, Self::Json]
    }

    #[must_use]
    pub fn file_name(self, prefix: &str) -> String {
        match self {
            Self::Text => format!("{prefix}_results.txt"),
            Self::Markdown => format!("{prefix}_results.md"),
            Self::Html => format!("{prefix}_results.html"),
            Self::M3u => format!("{prefix}_live.m3u"),
            Self::Json => format!("{prefix}_results.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub live: usize,
}

impl Summary {
    #[must_use]
    pub fn new(results: &[ProbeResult], total: usize) -> Self {
        Self {
            total,
            live: results.iter().filter(|r| r.is_live()).count(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report<'a> {
    pub generated_at: DateTime<Utc>,
    pub summary: Summary,
    pub results: &'a [ProbeResult],
}

impl<'a> Report<'a> {
    #[must_use]
    pub fn new(results: &'a [ProbeResult], total: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            summary: Summary::new(results, total),
            results,
        }
    }

    /// # Errors
    /// Errors only when JSON serialization fails
    pub fn render(&self, format: ReportFormat) -> Result<String> {
        Ok(match format {
            ReportFormat::Text => text::render(self),
            ReportFormat::Markdown => markdown::render(self),
            ReportFormat::Html => html::render(self),
            ReportFormat::M3u => {
                write_playlist(self.results.iter().filter(|r| r.is_live()).map(|r| &r.entry))
            }
            ReportFormat::Json => {
                serde_json::to_string_pretty(self).context("Serializing JSON report")?
            }
        })
    }

    fn generated_label(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}

/// Renders every requested format, then writes them all into `dir`.
///
/// Nothing is written when any format fails to render. Existing files are overwritten.
///
/// # Errors
/// Errors on render failure or when the directory or a file cannot be written
#[instrument(skip(report))]
pub async fn write_reports(
    report: &Report<'_>,
    dir: &Path,
    prefix: &str,
    formats: &[ReportFormat],
) -> Result<Vec<PathBuf>> {
    let rendered = formats
        .iter()
        .map(|&format| Ok((dir.join(format.file_name(prefix)), report.render(format)?)))
        .collect::<Result<Vec<_>>>()?;

    tokio::fs::create_dir_all(dir)
        .await
        .context(format!("Creating output directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(rendered.len());
    for (path, contents) in rendered {
        tokio::fs::write(&path, contents)
            .await
            .context(format!("Writing report {}", path.display()))?;
        info!("Results saved to {}", path.display());
        written.push(path);
    }

    Ok(written)
}
