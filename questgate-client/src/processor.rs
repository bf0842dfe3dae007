//! Request construction and job launch.
//!
//! The [`JobProcessor`] merges query parameters into the URL, builds one
//! [`HttpJob`] per submission, and hands back a [`JobHandle`] for awaiting
//! the outcome or cancelling.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use questgate_core::{RequestConfig, Secret};

use crate::job::{HttpJob, HttpMethod, JobOutcome};

/// Factory/supervisor for [`HttpJob`] instances.
///
/// Holds the shared HTTP client and the default request policy. Cheap to
/// clone.
#[derive(Clone)]
pub struct JobProcessor {
    client: reqwest::Client,
    default_config: RequestConfig,
}

impl JobProcessor {
    /// Create a processor with its own HTTP client.
    pub fn new(default_config: RequestConfig) -> Self {
        Self::with_client(reqwest::Client::new(), default_config)
    }

    /// Create a processor sharing an existing HTTP client.
    pub fn with_client(client: reqwest::Client, default_config: RequestConfig) -> Self {
        Self {
            client,
            default_config,
        }
    }

    /// Build and launch one job.
    ///
    /// Query parameters are percent-encoded and appended to `url`. Pass
    /// `config: None` to use the processor's default policy. A GET carrying
    /// a body is dispatched but logged as a protocol-hygiene warning.
    pub fn submit(
        &self,
        method: HttpMethod,
        url: &str,
        auth_token: Option<Secret>,
        body: impl Into<String>,
        query: &HashMap<String, String>,
        config: Option<RequestConfig>,
        retry_notify: Option<mpsc::UnboundedSender<u32>>,
    ) -> JobHandle {
        let body = body.into();
        if method == HttpMethod::Get && !body.is_empty() {
            warn!(url = %url, "GET request carries a body; dispatching anyway");
        }

        let final_url = build_url(url, query);
        let config = config.unwrap_or_else(|| self.default_config.clone());

        let job = Arc::new(HttpJob::new(
            self.client.clone(),
            method,
            final_url,
            auth_token,
            body,
            config,
        ));

        let (outcome_tx, outcome_rx) = oneshot::channel();
        if !job.execute(outcome_tx, retry_notify) {
            // Caller misuse, not a system fault; the outcome channel closes
            // without a completion.
            warn!(url = %url, "job refused execution; already running");
        }

        JobHandle {
            job,
            outcome: outcome_rx,
        }
    }
}

/// Handle to a launched job.
pub struct JobHandle {
    job: Arc<HttpJob>,
    outcome: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    /// Await the completion. Returns `None` if the job was cancelled.
    pub async fn outcome(self) -> Option<JobOutcome> {
        self.outcome.await.ok()
    }

    /// Cancel the underlying job.
    pub fn cancel(&self) {
        self.job.cancel();
    }

    /// Access the underlying job.
    pub fn job(&self) -> &Arc<HttpJob> {
        &self.job
    }
}

/// Merge query parameters into a base URL.
///
/// Each key/value pair is percent-encoded, pairs are joined with `&`, and
/// the block is appended with `?` unless the base URL already carries a
/// query string. Pair order follows map iteration order and is not
/// guaranteed.
pub(crate) fn build_url(base: &str, query: &HashMap<String, String>) -> String {
    if query.is_empty() {
        return base.to_string();
    }

    let pairs: Vec<String> = query
        .iter()
        .map(|(key, value)| {
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
        })
        .collect();

    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}{}", base, separator, pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_url_no_params() {
        let url = build_url("http://h/ep", &HashMap::new());
        assert_eq!(url, "http://h/ep");
    }

    #[test]
    fn test_build_url_encodes_pairs() {
        let mut query = HashMap::new();
        query.insert("a".to_string(), "1 2".to_string());
        query.insert("b".to_string(), "x&y".to_string());

        let url = build_url("http://h/ep", &query);

        // Key order across the map is not guaranteed; assert both pairs are
        // present and correctly encoded.
        assert!(url.starts_with("http://h/ep?"));
        assert!(url.contains("a=1%202"));
        assert!(url.contains("b=x%26y"));
        assert_eq!(url.matches('&').count(), 1);
    }

    #[test]
    fn test_build_url_appends_to_existing_query() {
        let mut query = HashMap::new();
        query.insert("page".to_string(), "2".to_string());

        let url = build_url("http://h/ep?sort=asc", &query);
        assert_eq!(url, "http://h/ep?sort=asc&page=2");
    }

    #[test]
    fn test_build_url_encodes_keys() {
        let mut query = HashMap::new();
        query.insert("a key".to_string(), "v".to_string());

        let url = build_url("http://h/ep", &query);
        assert_eq!(url, "http://h/ep?a%20key=v");
    }
}
