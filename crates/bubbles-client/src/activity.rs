//! Sources of the server's last-activity timestamp.
//!
//! Uses enum dispatch instead of trait objects because the poller awaits
//! the source inside a spawned task. [`ActivitySource::Http`] talks to the
//! real `api/activity` endpoint via `reqwest`; [`ActivitySource::Scripted`]
//! replays canned answers for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bubbles_types::ActivityResponse;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ClientError;

/// Where the liveness poller gets its timestamps from.
#[derive(Debug, Clone)]
pub enum ActivitySource {
    /// HTTP `GET` against the status endpoint.
    Http(HttpActivitySource),
    /// Pre-recorded answers, consumed in order.
    Scripted(ScriptedActivitySource),
}

impl ActivitySource {
    /// Fetch the last-activity timestamp once.
    ///
    /// Dispatches to the concrete source.
    pub async fn last_activity(&self) -> Result<ActivityResponse, ClientError> {
        match self {
            Self::Http(http) => http.last_activity().await,
            Self::Scripted(script) => script.last_activity().await,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Polls the status endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct HttpActivitySource {
    client: reqwest::Client,
    url: String,
}

impl HttpActivitySource {
    /// Create a source for `url` whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn last_activity(&self) -> Result<ActivityResponse, ClientError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ClientError::Status(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(format!("server returned {status}")));
        }

        let body: ActivityResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Status(format!("response parse failed: {e}")))?;
        debug!(last_activity = body.last_activity, "activity fetched");
        Ok(body)
    }
}

// ---------------------------------------------------------------------------
// Scripted
// ---------------------------------------------------------------------------

/// Replays a queue of answers. Clones share the queue.
///
/// Once the queue is empty every fetch fails.
#[derive(Debug, Clone, Default)]
pub struct ScriptedActivitySource {
    answers: Arc<Mutex<VecDeque<Result<i64, String>>>>,
}

impl ScriptedActivitySource {
    /// Create a source from answers: `Ok(epoch_ms)` or `Err(reason)`.
    pub fn new(answers: impl IntoIterator<Item = Result<i64, String>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers.into_iter().collect())),
        }
    }

    /// Queue one more answer.
    pub async fn push(&self, answer: Result<i64, String>) {
        self.answers.lock().await.push_back(answer);
    }

    /// Number of answers not yet consumed.
    pub async fn remaining(&self) -> usize {
        self.answers.lock().await.len()
    }

    async fn last_activity(&self) -> Result<ActivityResponse, ClientError> {
        match self.answers.lock().await.pop_front() {
            Some(Ok(last_activity)) => Ok(ActivityResponse { last_activity }),
            Some(Err(reason)) => Err(ClientError::Status(reason)),
            None => Err(ClientError::Status("no scripted answer left".to_owned())),
        }
    }
}
