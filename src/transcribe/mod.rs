use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{sleep, timeout};

use crate::config::Config;
use crate::extractors::youtube::YoutubeSource;
use crate::extractors::{FetchError, FetchRequest, Transcript, TranscriptSource};
use crate::proxy::{resolve_proxy, ProxySource};

pub mod policy;

pub use policy::{Backoff, RetryOn, RetryPolicy, UniformJitter};

/// Classification of a failed fetch, shared with the response layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Disabled,
    NotFound,
    Unavailable,
    Other,
}

/// Result of one `fetch_with_retry` call
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success {
        transcript: Transcript,
    },
    Failure {
        reason: String,
        kind: FailureKind,
        /// Every allowed attempt was used
        exhausted: bool,
    },
}

impl FetchOutcome {
    fn from_error(error: &FetchError, exhausted: bool) -> Self {
        FetchOutcome::Failure {
            reason: error.to_string(),
            kind: error.kind(),
            exhausted,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

/// Runs a transcript source under a retry policy
pub struct ResilientFetcher {
    source: Arc<dyn TranscriptSource>,
    proxy: Arc<dyn ProxySource>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(
        source: Arc<dyn TranscriptSource>,
        proxy: Arc<dyn ProxySource>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            source,
            proxy,
            policy,
        }
    }

    /// Create a fetcher for YouTube using the loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(YoutubeSource::new(&config.fetch)),
            config.proxy.source(),
            RetryPolicy::from(&config.retry),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn source(&self) -> &dyn TranscriptSource {
        self.source.as_ref()
    }

    pub fn proxy_source(&self) -> &dyn ProxySource {
        self.proxy.as_ref()
    }

    /// Fetch a transcript using the policy's attempt budget
    pub async fn fetch_with_retry(&self, request: &FetchRequest) -> FetchOutcome {
        self.fetch_with_retry_n(request, self.policy.max_attempts).await
    }

    /// Fetch a transcript with an explicit attempt budget.
    ///
    /// Never fails: every path, including the overall deadline, produces a
    /// `FetchOutcome`.
    pub async fn fetch_with_retry_n(&self, request: &FetchRequest, max_retries: u32) -> FetchOutcome {
        let max_attempts = max_retries.max(1);
        let mut last_error = None;

        let Some(limit) = self.policy.overall_timeout else {
            return self.run_attempts(request, max_attempts, &mut last_error).await;
        };

        let result = timeout(limit, self.run_attempts(request, max_attempts, &mut last_error)).await;
        let Ok(outcome) = result else {
            tracing::warn!(
                "Gave up on {} after {:.1}s overall timeout",
                request.video_id,
                limit.as_secs_f64()
            );
            let timed_out = format!(
                "Timed out after {:.1}s fetching transcript for video {}",
                limit.as_secs_f64(),
                request.video_id
            );
            return match last_error {
                Some(err) => FetchOutcome::Failure {
                    reason: format!("{} (last error: {})", timed_out, err),
                    kind: err.kind(),
                    exhausted: false,
                },
                None => FetchOutcome::Failure {
                    reason: timed_out,
                    kind: FailureKind::Other,
                    exhausted: false,
                },
            };
        };
        outcome
    }

    async fn run_attempts(
        &self,
        request: &FetchRequest,
        max_attempts: u32,
        last_error: &mut Option<FetchError>,
    ) -> FetchOutcome {
        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.policy.backoff.delay(attempt);
                tracing::debug!(
                    "Waiting {:.2}s before attempt {}/{} for {}",
                    delay.as_secs_f64(),
                    attempt + 1,
                    max_attempts,
                    request.video_id
                );
                sleep(delay).await;
            }

            let proxy = resolve_proxy(self.proxy.as_ref());

            match self.source.fetch(request, proxy).await {
                Ok(transcript) => {
                    tracing::info!(
                        "Fetched {} segments for {} on attempt {}",
                        transcript.len(),
                        request.video_id,
                        attempt + 1
                    );
                    return FetchOutcome::Success { transcript };
                }
                Err(err) => {
                    if attempt + 1 == max_attempts {
                        tracing::warn!(
                            "Attempt {}/{} for {} failed, giving up: {}",
                            attempt + 1,
                            max_attempts,
                            request.video_id,
                            err
                        );
                        return FetchOutcome::from_error(&err, true);
                    }

                    if !self.policy.retry_on.should_retry(&err) {
                        tracing::warn!(
                            "Attempt {}/{} for {} hit a permanent error: {}",
                            attempt + 1,
                            max_attempts,
                            request.video_id,
                            err
                        );
                        return FetchOutcome::from_error(&err, false);
                    }

                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt + 1,
                        max_attempts,
                        request.video_id,
                        err
                    );
                    *last_error = Some(err);
                }
            }
        }

        FetchOutcome::Failure {
            reason: "Max retries exceeded".to_string(),
            kind: FailureKind::Other,
            exhausted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{MockTranscriptSource, TranscriptSegment};
    use crate::proxy::{ProxyConfig, StaticProxySource};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    /// Records every delay it hands out
    #[derive(Default)]
    struct RecordingBackoff {
        inner: UniformJitter,
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingBackoff {
        fn delays(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    impl Backoff for RecordingBackoff {
        fn delay(&self, attempt: u32) -> Duration {
            let delay = self.inner.delay(attempt);
            self.delays.lock().unwrap().push(delay);
            delay
        }
    }

    #[derive(Default)]
    struct CountingProxySource {
        calls: AtomicUsize,
        endpoint: Option<String>,
    }

    impl ProxySource for CountingProxySource {
        fn http_proxy(&self) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.endpoint.clone()
        }

        fn https_proxy(&self) -> Option<String> {
            None
        }
    }

    struct HangingSource;

    #[async_trait]
    impl TranscriptSource for HangingSource {
        async fn fetch(&self, _: &FetchRequest, _: Option<ProxyConfig>) -> Result<Transcript, FetchError> {
            sleep(Duration::from_secs(100)).await;
            Err(FetchError::Other("too slow".to_string()))
        }

        fn platform_name(&self) -> &'static str {
            "Hanging"
        }
    }

    fn segments(n: usize) -> Transcript {
        (0..n)
            .map(|i| TranscriptSegment {
                text: format!("line {}", i),
                start: i as f64 * 2.0,
                duration: 2.0,
            })
            .collect()
    }

    fn fetcher(source: MockTranscriptSource, backoff: Arc<RecordingBackoff>) -> ResilientFetcher {
        ResilientFetcher::new(
            Arc::new(source),
            Arc::new(StaticProxySource::default()),
            RetryPolicy::default().with_backoff(backoff),
        )
    }

    fn assert_delays_in_range(delays: &[Duration]) {
        for delay in delays {
            assert!(*delay >= Duration::from_secs(1) && *delay <= Duration::from_secs(3));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_has_no_delay() {
        let mut source = MockTranscriptSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(segments(5)));

        let backoff = Arc::new(RecordingBackoff::default());
        let fetcher = fetcher(source, backoff.clone());

        let start = Instant::now();
        let outcome = fetcher.fetch_with_retry(&FetchRequest::new("abc123")).await;

        assert_eq!(outcome, FetchOutcome::Success { transcript: segments(5) });
        assert!(backoff.delays().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_third_attempt() {
        let mut source = MockTranscriptSource::new();
        let mut calls = 0;
        source.expect_fetch().times(3).returning(move |_, _| {
            calls += 1;
            if calls < 3 {
                Err(FetchError::Other("HTTP 429".to_string()))
            } else {
                Ok(segments(2))
            }
        });

        let backoff = Arc::new(RecordingBackoff::default());
        let fetcher = fetcher(source, backoff.clone());

        let start = Instant::now();
        let outcome = fetcher.fetch_with_retry(&FetchRequest::new("abc123")).await;

        assert!(outcome.is_success());
        let delays = backoff.delays();
        assert_eq!(delays.len(), 2);
        assert_delays_in_range(&delays);
        assert!(start.elapsed() >= delays.iter().sum::<Duration>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_on_every_attempt_exhausts_budget() {
        let mut source = MockTranscriptSource::new();
        source
            .expect_fetch()
            .times(3)
            .returning(|req, _| Err(FetchError::TranscriptsDisabled(req.video_id.clone())));

        let backoff = Arc::new(RecordingBackoff::default());
        let fetcher = fetcher(source, backoff.clone());

        let outcome = fetcher.fetch_with_retry(&FetchRequest::new("xyz999")).await;

        match outcome {
            FetchOutcome::Failure { reason, kind, exhausted } => {
                assert!(reason.contains("disabled"));
                assert!(reason.contains("xyz999"));
                assert_eq!(kind, FailureKind::Disabled);
                assert!(exhausted);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        let delays = backoff.delays();
        assert_eq!(delays.len(), 2);
        assert_delays_in_range(&delays);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reports_last_error() {
        let mut source = MockTranscriptSource::new();
        let mut calls = 0;
        source.expect_fetch().times(3).returning(move |_, _| {
            calls += 1;
            Err(FetchError::Other(format!("failure #{}", calls)))
        });

        let fetcher = fetcher(source, Arc::new(RecordingBackoff::default()));
        let outcome = fetcher.fetch_with_retry(&FetchRequest::new("abc123")).await;

        assert_eq!(
            outcome,
            FetchOutcome::Failure {
                reason: "failure #3".to_string(),
                kind: FailureKind::Other,
                exhausted: true,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_budget() {
        let mut source = MockTranscriptSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_, _| Err(FetchError::Other("boom".to_string())));

        let backoff = Arc::new(RecordingBackoff::default());
        let fetcher = fetcher(source, backoff.clone());

        let outcome = fetcher.fetch_with_retry_n(&FetchRequest::new("abc123"), 1).await;

        assert!(matches!(outcome, FetchOutcome::Failure { exhausted: true, .. }));
        assert!(backoff.delays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_still_makes_one_attempt() {
        let mut source = MockTranscriptSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_, _| Ok(segments(1)));

        let fetcher = fetcher(source, Arc::new(RecordingBackoff::default()));
        assert!(fetcher.fetch_with_retry_n(&FetchRequest::new("abc123"), 0).await.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_language_preference_forwarded_on_every_attempt() {
        let mut source = MockTranscriptSource::new();
        let mut calls = 0;
        source
            .expect_fetch()
            .withf(|req, _| req.video_id == "lang1" && req.language_preferences == vec!["es".to_string()])
            .times(2)
            .returning(move |_, _| {
                calls += 1;
                if calls == 1 {
                    Err(FetchError::Other("transient".to_string()))
                } else {
                    Ok(segments(3))
                }
            });

        let fetcher = fetcher(source, Arc::new(RecordingBackoff::default()));
        let request = FetchRequest::new("lang1").with_languages(["es"]);

        assert!(fetcher.fetch_with_retry(&request).await.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_proxy_when_unset() {
        let mut source = MockTranscriptSource::new();
        source
            .expect_fetch()
            .withf(|_, proxy| proxy.is_none())
            .times(1)
            .returning(|_, _| Ok(segments(1)));

        let fetcher = fetcher(source, Arc::new(RecordingBackoff::default()));
        assert!(fetcher.fetch_with_retry(&FetchRequest::new("abc123")).await.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_proxy_resolved_once_per_attempt() {
        let mut source = MockTranscriptSource::new();
        source
            .expect_fetch()
            .withf(|_, proxy| {
                proxy.as_ref().and_then(|p| p.http_endpoint.as_deref()) == Some("http://proxy:8080")
            })
            .times(3)
            .returning(|_, _| Err(FetchError::Other("blocked".to_string())));

        let proxy = Arc::new(CountingProxySource {
            calls: AtomicUsize::new(0),
            endpoint: Some("http://proxy:8080".to_string()),
        });
        let fetcher = ResilientFetcher::new(
            Arc::new(source),
            proxy.clone(),
            RetryPolicy::default().with_backoff(Arc::new(RecordingBackoff::default())),
        );

        fetcher.fetch_with_retry(&FetchRequest::new("abc123")).await;
        assert_eq!(proxy.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_only_short_circuits_permanent_errors() {
        let mut source = MockTranscriptSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|req, _| Err(FetchError::VideoUnavailable(req.video_id.clone())));

        let backoff = Arc::new(RecordingBackoff::default());
        let fetcher = ResilientFetcher::new(
            Arc::new(source),
            Arc::new(StaticProxySource::default()),
            RetryPolicy::default()
                .with_backoff(backoff.clone())
                .with_retry_on(RetryOn::TransientOnly),
        );

        let outcome = fetcher.fetch_with_retry(&FetchRequest::new("gone")).await;

        assert!(matches!(
            outcome,
            FetchOutcome::Failure { kind: FailureKind::Unavailable, exhausted: false, .. }
        ));
        assert!(backoff.delays().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_timeout_guard() {
        let fetcher = ResilientFetcher::new(
            Arc::new(HangingSource),
            Arc::new(StaticProxySource::default()),
            RetryPolicy::default().with_overall_timeout(Some(Duration::from_secs(10))),
        );

        let start = Instant::now();
        let outcome = fetcher.fetch_with_retry(&FetchRequest::new("slow")).await;

        match outcome {
            FetchOutcome::Failure { reason, kind, exhausted } => {
                assert!(reason.starts_with("Timed out"));
                assert_eq!(kind, FailureKind::Other);
                assert!(!exhausted);
            }
            other => panic!("expected timeout failure, got {:?}", other),
        }
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(100));
    }

    /// Fails with disabled captions until its last attempt, which stalls
    struct StallingSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranscriptSource for StallingSource {
        async fn fetch(&self, req: &FetchRequest, _: Option<ProxyConfig>) -> Result<Transcript, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(FetchError::TranscriptsDisabled(req.video_id.clone()));
            }
            sleep(Duration::from_secs(100)).await;
            Ok(segments(1))
        }

        fn platform_name(&self) -> &'static str {
            "Stalling"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_last_error_kind() {
        let source = Arc::new(StallingSource {
            calls: AtomicUsize::new(0),
        });
        let fetcher = ResilientFetcher::new(
            source.clone(),
            Arc::new(StaticProxySource::default()),
            RetryPolicy::default().with_overall_timeout(Some(Duration::from_secs(30))),
        );

        let outcome = fetcher.fetch_with_retry(&FetchRequest::new("xyz999")).await;

        match outcome {
            FetchOutcome::Failure { reason, kind, exhausted } => {
                assert!(reason.starts_with("Timed out"));
                assert!(reason.contains("disabled"));
                assert_eq!(kind, FailureKind::Disabled);
                assert!(!exhausted);
            }
            other => panic!("expected timeout failure, got {:?}", other),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_default_deadline_covers_default_attempts() {
        let config = Config::default();
        let per_attempt = config.fetch.request_timeout_secs * 3;
        let worst_case = per_attempt * u64::from(config.retry.max_attempts)
            + config.retry.max_delay_ms / 1000 * u64::from(config.retry.max_attempts - 1);
        assert!(config.retry.overall_timeout_secs.unwrap() > worst_case);
    }
}
