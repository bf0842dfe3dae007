//! The per-request job state machine.
//!
//! An [`HttpJob`] executes one logical HTTP call with bounded retries and a
//! per-attempt timeout. It owns no knowledge of authentication semantics;
//! the token it is handed is just a header value.
//!
//! States: Idle -> Running -> {Completed, Cancelled}, with a retry sub-loop
//! inside Running. Retries reuse the same job instance and increment the
//! attempt counter; `max_retries` counts total attempts, so `1` means a
//! single attempt with no retry.
//!
//! Completion is delivered exactly once per `execute()` over a oneshot
//! channel, and never after `cancel()`.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use questgate_core::{RequestConfig, Secret};

/// Synthetic body reported when an attempt times out with no retry left.
const TIMEOUT_BODY: &str =
    r#"{"message": "HTTP request timed out before a response was received"}"#;

/// HTTP methods supported by the client layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Get the method as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    pub(crate) fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error type for job lifecycle misuse.
#[derive(Debug, Error)]
pub enum JobError {
    /// The job is already running; wait for completion or cancel first.
    #[error("job is already running")]
    InvalidState,
}

/// Final result of one `execute()` run.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Whether the request reached the server and produced a response.
    pub network_ok: bool,

    /// HTTP status code; `0` when the request never reached the server,
    /// `408` for a client-side timeout.
    pub status: u16,

    /// Raw response body, or a synthetic body for timeouts.
    pub body: String,

    /// Total attempts performed.
    pub attempts: u32,
}

#[derive(Clone)]
struct JobParams {
    method: HttpMethod,
    url: String,
    auth_token: Option<Secret>,
    body: String,
    config: RequestConfig,
}

/// One logical HTTP call with bounded retries and a timeout.
///
/// Created per call and driven by a spawned task; cancellation aborts the
/// in-flight network call and suppresses the completion delivery.
pub struct HttpJob {
    client: reqwest::Client,
    id: String,
    params: Mutex<JobParams>,
    attempt: AtomicU32,
    running: AtomicBool,
    cancelled: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
}

impl HttpJob {
    /// Create a new job. The job is idle until [`execute`](Self::execute).
    pub fn new(
        client: reqwest::Client,
        method: HttpMethod,
        url: impl Into<String>,
        auth_token: Option<Secret>,
        body: impl Into<String>,
        config: RequestConfig,
    ) -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self {
            client,
            id,
            params: Mutex::new(JobParams {
                method,
                url: url.into(),
                auth_token,
                body: body.into(),
                config,
            }),
            attempt: AtomicU32::new(0),
            running: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            cancel: Mutex::new(None),
        }
    }

    /// Re-arm an idle job with new request parameters.
    ///
    /// Resets the attempt counter and flags. Fails with
    /// [`JobError::InvalidState`] while the job is running; wait for
    /// completion or cancel first.
    pub fn initialize(
        &self,
        method: HttpMethod,
        url: impl Into<String>,
        auth_token: Option<Secret>,
        body: impl Into<String>,
        config: RequestConfig,
    ) -> Result<(), JobError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(JobError::InvalidState);
        }
        *self.params.lock() = JobParams {
            method,
            url: url.into(),
            auth_token,
            body: body.into(),
            config,
        };
        self.attempt.store(0, Ordering::SeqCst);
        self.cancelled.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Start the job. Returns `false` (and does nothing) if already running.
    ///
    /// The outcome is sent over `outcome_tx` exactly once, unless the job is
    /// cancelled, in which case the sender is dropped without a send. Retry
    /// notifications carry the upcoming attempt number.
    pub fn execute(
        self: &Arc<Self>,
        outcome_tx: oneshot::Sender<JobOutcome>,
        retry_notify: Option<mpsc::UnboundedSender<u32>>,
    ) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!(job = %self.id, "execute refused; job is already running");
            return false;
        }
        self.cancelled.store(false, Ordering::SeqCst);
        self.attempt.store(0, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        *self.cancel.lock() = Some(cancel.clone());

        let job = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = job.drive(cancel, retry_notify).await;
            match outcome {
                Some(outcome) if !job.cancelled.load(Ordering::SeqCst) => {
                    job.running.store(false, Ordering::SeqCst);
                    *job.cancel.lock() = None;
                    let _ = outcome_tx.send(outcome);
                }
                _ => {
                    // Cancelled: cancel() already reset the state; the
                    // sender is dropped and no completion fires.
                }
            }
        });
        true
    }

    /// Cancel the job. Idempotent; a no-op when idle or already cancelled.
    ///
    /// Aborts the in-flight network call and any retry/timeout waits. No
    /// completion is delivered afterwards, even if a response was already on
    /// the wire.
    pub fn cancel(&self) {
        if self.cancelled.load(Ordering::SeqCst) || !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        self.running.store(false, Ordering::SeqCst);
        info!(job = %self.id, attempts = self.attempt.load(Ordering::SeqCst), "job cancelled");
    }

    /// The attempt counter, `0` until the first send.
    pub fn current_attempt(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The retry sub-loop. Returns `None` when cancelled.
    async fn drive(
        &self,
        cancel: CancellationToken,
        retry_notify: Option<mpsc::UnboundedSender<u32>>,
    ) -> Option<JobOutcome> {
        let params = self.params.lock().clone();
        let config = &params.config;
        let max_attempts = config.max_retries.max(1);

        loop {
            let attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(
                job = %self.id,
                attempt,
                max_attempts,
                method = %params.method,
                url = %params.url,
                "sending HTTP request"
            );

            let send = self.send_once(&params);
            let result = tokio::select! {
                _ = cancel.cancelled() => return None,
                result = tokio::time::timeout(config.timeout(), send) => result,
            };

            match result {
                Ok(Ok((status, body))) => {
                    let server_error = status >= 500 && status < 600;
                    if server_error && config.retry_on_5xx && attempt < max_attempts {
                        warn!(job = %self.id, status, "server error, retrying");
                        if !self
                            .pause_before_retry(attempt, config, &cancel, &retry_notify)
                            .await
                        {
                            return None;
                        }
                        continue;
                    }
                    return Some(self.finalize(true, status, body, attempt));
                }
                Ok(Err(err)) => {
                    warn!(job = %self.id, error = %err, "network error");
                    if config.retry_on_network_error && attempt < max_attempts {
                        if !self
                            .pause_before_retry(attempt, config, &cancel, &retry_notify)
                            .await
                        {
                            return None;
                        }
                        continue;
                    }
                    return Some(self.finalize(false, 0, String::new(), attempt));
                }
                Err(_elapsed) => {
                    // Dropping the send future aborts the in-flight call, so
                    // a late response can never complete this job.
                    warn!(job = %self.id, attempt, "request timed out");
                    if config.retry_on_timeout && attempt < max_attempts {
                        if !self
                            .pause_before_retry(attempt, config, &cancel, &retry_notify)
                            .await
                        {
                            return None;
                        }
                        continue;
                    }
                    return Some(self.finalize(false, 408, TIMEOUT_BODY.to_string(), attempt));
                }
            }
        }
    }

    async fn send_once(&self, params: &JobParams) -> Result<(u16, String), reqwest::Error> {
        let mut request = self
            .client
            .request(params.method.as_reqwest(), &params.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        if let Some(token) = &params.auth_token {
            if !token.is_empty() {
                request = request.bearer_auth(token.expose());
            }
        }
        if !params.body.is_empty() {
            request = request.body(params.body.clone());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Notify and wait out the fixed retry delay. Returns `false` when
    /// cancelled during the wait.
    async fn pause_before_retry(
        &self,
        attempt: u32,
        config: &RequestConfig,
        cancel: &CancellationToken,
        retry_notify: &Option<mpsc::UnboundedSender<u32>>,
    ) -> bool {
        if let Some(tx) = retry_notify {
            let _ = tx.send(attempt + 1);
        }
        debug!(
            job = %self.id,
            delay_secs = config.retry_delay_secs,
            next_attempt = attempt + 1,
            "retry scheduled"
        );
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(config.retry_delay()) => true,
        }
    }

    fn finalize(&self, network_ok: bool, status: u16, body: String, attempts: u32) -> JobOutcome {
        debug!(job = %self.id, network_ok, status, attempts, "job complete");
        JobOutcome {
            network_ok,
            status,
            body,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_config() -> RequestConfig {
        RequestConfig {
            max_retries: 1,
            retry_delay_secs: 0.01,
            timeout_secs: 5.0,
            ..RequestConfig::default()
        }
    }

    #[test]
    fn test_method_strings() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Delete.as_str(), "DELETE");
    }

    #[tokio::test]
    async fn test_initialize_resets_idle_job() {
        let job = HttpJob::new(
            reqwest::Client::new(),
            HttpMethod::Get,
            "http://localhost/one",
            None,
            "",
            quick_config(),
        );
        assert_eq!(job.current_attempt(), 0);
        assert!(!job.is_running());

        job.initialize(
            HttpMethod::Post,
            "http://localhost/two",
            Some(Secret::new("t")),
            "{}",
            quick_config(),
        )
        .unwrap();
        assert_eq!(job.current_attempt(), 0);
    }

    #[tokio::test]
    async fn test_initialize_fails_while_running() {
        // Target a port with nothing listening; a generous timeout keeps the
        // job running long enough to observe the state.
        let config = RequestConfig {
            max_retries: 3,
            retry_delay_secs: 5.0,
            timeout_secs: 5.0,
            ..RequestConfig::default()
        };
        let job = Arc::new(HttpJob::new(
            reqwest::Client::new(),
            HttpMethod::Get,
            "http://127.0.0.1:9/unreachable",
            None,
            "",
            config.clone(),
        ));

        let (tx, _rx) = oneshot::channel();
        assert!(job.execute(tx, None));

        let result = job.initialize(HttpMethod::Get, "http://localhost", None, "", config);
        assert!(matches!(result, Err(JobError::InvalidState)));

        job.cancel();
        assert!(job.is_cancelled());
    }

    #[tokio::test]
    async fn test_execute_refused_while_running() {
        let config = RequestConfig {
            max_retries: 3,
            retry_delay_secs: 5.0,
            timeout_secs: 5.0,
            ..RequestConfig::default()
        };
        let job = Arc::new(HttpJob::new(
            reqwest::Client::new(),
            HttpMethod::Get,
            "http://127.0.0.1:9/unreachable",
            None,
            "",
            config,
        ));

        let (tx1, _rx1) = oneshot::channel();
        assert!(job.execute(tx1, None));

        let (tx2, _rx2) = oneshot::channel();
        assert!(!job.execute(tx2, None));

        job.cancel();
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_when_idle() {
        let job = HttpJob::new(
            reqwest::Client::new(),
            HttpMethod::Get,
            "http://localhost",
            None,
            "",
            quick_config(),
        );
        job.cancel();
        job.cancel();
        assert!(!job.is_cancelled());
    }
}
