use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use indicatif::ProgressBar;
use thiserror::Error;
use tokio::{
    select,
    sync::Semaphore,
    task::{Id, JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    playlist::entry::StreamEntry,
    probe::{
        ProbeOptions,
        fetch::Fetch,
        probe,
        structs::{ProbeResult, StatusKind},
    },
    util::truncate_string,
};

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const MAX_CONCURRENCY: usize = 1024;

#[derive(Debug, Error)]
#[error("Probing interrupted after {checked} of {total} streams")]
pub struct Interrupted {
    pub checked: usize,
    pub total: usize,
}

/// Probes entries with a bounded number of in-flight requests
pub struct Scheduler {
    concurrency: usize,
    options: Arc<ProbeOptions>,
    progress: ProgressBar,
    ct: CancellationToken,
}

impl Scheduler {
    #[must_use]
    pub fn new(concurrency: usize, options: ProbeOptions) -> Self {
        Self {
            concurrency: concurrency.clamp(1, MAX_CONCURRENCY),
            options: Arc::new(options),
            progress: ProgressBar::hidden(),
            ct: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, ct: CancellationToken) -> Self {
        self.ct = ct;
        self
    }

    /// Probes every entry and returns exactly one result per entry, in playlist order.
    ///
    /// A permit is taken before each task is spawned, so at most `concurrency` probes exist at once.
    ///
    /// # Errors
    /// Errors only when the cancellation token fires. In-flight probes are aborted.
    pub async fn run_all<F: Fetch>(
        &self,
        fetcher: Arc<F>,
        entries: Vec<StreamEntry>,
    ) -> Result<Vec<ProbeResult>, Interrupted> {
        let total = entries.len();
        self.progress.set_length(total as u64);

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let checked = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, (usize, StreamEntry)> = HashMap::with_capacity(total);
        let mut results: Vec<Option<ProbeResult>> = vec![None; total];

        for (index, entry) in entries.into_iter().enumerate() {
            let permit = select! {
                biased;
                () = self.ct.cancelled() => None,
                p = semaphore.clone().acquire_owned() => p.ok(),
            };
            let Some(permit) = permit else {
                tasks.abort_all();
                return Err(Interrupted {
                    checked: checked.load(Ordering::SeqCst),
                    total,
                });
            };

            while let Some(done) = tasks.try_join_next_with_id() {
                self.collect(done, &mut pending, &mut results, &checked, total);
            }

            let fallback = entry.clone();
            let fetcher = fetcher.clone();
            let options = self.options.clone();
            let checked = checked.clone();
            let progress = self.progress.clone();

            let handle = tasks.spawn(async move {
                let _permit = permit;
                let result = probe(fetcher.as_ref(), entry, &options).await;
                report_progress(&progress, &checked, total, &result);
                result
            });
            pending.insert(handle.id(), (index, fallback));
        }

        loop {
            let done = select! {
                biased;
                () = self.ct.cancelled() => {
                    tasks.abort_all();
                    return Err(Interrupted {
                        checked: checked.load(Ordering::SeqCst),
                        total,
                    });
                }
                done = tasks.join_next_with_id() => done,
            };
            let Some(done) = done else {
                break;
            };
            self.collect(done, &mut pending, &mut results, &checked, total);
        }

        self.progress.finish_and_clear();
        Ok(results.into_iter().flatten().collect())
    }

    fn collect(
        &self,
        done: Result<(Id, ProbeResult), JoinError>,
        pending: &mut HashMap<Id, (usize, StreamEntry)>,
        results: &mut [Option<ProbeResult>],
        checked: &AtomicUsize,
        total: usize,
    ) {
        match done {
            Ok((id, result)) => {
                if let Some((index, _)) = pending.remove(&id) {
                    results[index] = Some(result);
                }
            }
            Err(e) => {
                let Some((index, entry)) = pending.remove(&e.id()) else {
                    return;
                };
                error!("Probe task for {} failed: {e}", entry.url);
                let result = ProbeResult {
                    entry,
                    status: StatusKind::Error,
                    http_status: None,
                    segment_count: None,
                    error_detail: Some(format!("Probe task failed: {e}")),
                    elapsed_ms: 0,
                };
                report_progress(&self.progress, checked, total, &result);
                results[index] = Some(result);
            }
        }
    }
}

fn report_progress(progress: &ProgressBar, checked: &AtomicUsize, total: usize, result: &ProbeResult) {
    let i = checked.fetch_add(1, Ordering::SeqCst) + 1;
    progress.suspend(|| {
        info!(
            "Checked {i}/{total}: {} - {}",
            truncate_string(&result.entry.name, 60),
            result.status_line()
        );
    });
    progress.inc(1);
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use reqwest::header::HeaderMap;

    use super::*;
    use crate::probe::fetch::{FetchRequest, FetchResponse, TransportError};

    #[derive(Default)]
    struct FakeFetcher {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Fetch for FakeFetcher {
        async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let i: u64 = request
                .url
                .rsplit('/')
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            assert!(!request.url.contains("panic"), "fake fetcher told to panic");

            // Later entries often finish first
            tokio::time::sleep(Duration::from_millis((i * 7) % 11 * 3)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match i % 3 {
                0 => Ok(FetchResponse {
                    status: 200,
                    headers: HeaderMap::new(),
                    body_prefix: b"#EXTM3U\na.ts\n".to_vec(),
                }),
                1 => Ok(FetchResponse {
                    status: 404,
                    headers: HeaderMap::new(),
                    body_prefix: Vec::new(),
                }),
                _ => Err(TransportError::Timeout("operation timed out".to_string())),
            }
        }
    }

    fn entries(urls: impl IntoIterator<Item = String>) -> Vec<StreamEntry> {
        urls.into_iter()
            .map(|url| StreamEntry {
                name: format!("Channel {url}"),
                url,
                referer: None,
                user_agent: None,
                logo: None,
                group: None,
                duration: "-1".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn returns_every_entry_exactly_once() {
        let fetcher = Arc::new(FakeFetcher::default());
        let input = entries((0..25).map(|i| format!("http://host/{i}")));

        let results = Scheduler::new(4, ProbeOptions::default())
            .run_all(fetcher.clone(), input.clone())
            .await
            .unwrap();

        assert_eq!(results.len(), 25);
        let urls: HashSet<_> = results.iter().map(|r| r.entry.url.clone()).collect();
        assert_eq!(urls.len(), 25);
        assert_eq!(
            results.iter().map(|r| &r.entry).collect::<Vec<_>>(),
            input.iter().collect::<Vec<_>>()
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 25);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn results_reflect_each_probe_outcome() {
        let fetcher = Arc::new(FakeFetcher::default());
        let input = entries((0..3).map(|i| format!("http://host/{i}")));

        let results = Scheduler::new(2, ProbeOptions::default())
            .run_all(fetcher, input)
            .await
            .unwrap();

        assert_eq!(results[0].status, StatusKind::Live);
        assert_eq!(results[1].status, StatusKind::Down);
        assert_eq!(results[1].http_status, Some(404));
        assert_eq!(results[2].status, StatusKind::Down);
        assert!(results[2].error_detail.is_some());
    }

    #[tokio::test]
    async fn panicking_probe_does_not_abort_batch() {
        let fetcher = Arc::new(FakeFetcher::default());
        let input = entries(["http://host/0", "http://host/panic", "http://host/3"].map(String::from));

        let results = Scheduler::new(2, ProbeOptions::default())
            .run_all(fetcher, input)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[1].entry.url, "http://host/panic");
        assert_eq!(results[1].status, StatusKind::Error);
        assert!(results[1].error_detail.is_some());
        assert!(results[0].is_live());
        assert!(results[2].is_live());
    }

    #[tokio::test]
    async fn cancellation_interrupts_run() {
        let ct = CancellationToken::new();
        ct.cancel();
        let input = entries((0..5).map(|i| format!("http://host/{i}")));

        let err = Scheduler::new(2, ProbeOptions::default())
            .with_cancellation(ct)
            .run_all(Arc::new(FakeFetcher::default()), input)
            .await
            .unwrap_err();

        assert_eq!(err.checked, 0);
        assert_eq!(err.total, 5);
    }

    #[tokio::test]
    async fn progress_counts_every_completion() {
        let progress = ProgressBar::hidden();
        let input = entries((0..12).map(|i| format!("http://host/{i}")));

        Scheduler::new(3, ProbeOptions::default())
            .with_progress(progress.clone())
            .run_all(Arc::new(FakeFetcher::default()), input)
            .await
            .unwrap();

        assert_eq!(progress.length(), Some(12));
        assert_eq!(progress.position(), 12);
    }

    #[tokio::test]
    async fn progress_counts_panicked_tasks() {
        let progress = ProgressBar::hidden();
        let input = entries(
            ["http://host/0", "http://host/panic", "http://host/1", "http://host/2"].map(String::from),
        );

        let results = Scheduler::new(2, ProbeOptions::default())
            .with_progress(progress.clone())
            .run_all(Arc::new(FakeFetcher::default()), input)
            .await
            .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(progress.position(), 4);
    }

    #[tokio::test]
    async fn oversized_concurrency_is_clamped() {
        let fetcher = Arc::new(FakeFetcher::default());
        let input = entries((0..5).map(|i| format!("http://host/{i}")));

        let results = Scheduler::new(usize::MAX, ProbeOptions::default())
            .run_all(fetcher.clone(), input)
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        assert!(fetcher.max_in_flight.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn empty_input_yields_no_results() {
        let results = Scheduler::new(3, ProbeOptions::default())
            .run_all(Arc::new(FakeFetcher::default()), Vec::new())
            .await
            .unwrap();

        assert!(results.is_empty());
    }
}
