//! FIFO request scheduler with rate-limit gating.
//!
//! All outbound calls for one client funnel through a single worker task:
//! strict submission order, at most one HTTP call in flight. The worker
//! waits out any active global window, then the route's bucket window,
//! executes with retry, feeds quota headers back into the registry, and
//! sleeps a small courtesy floor before the next item.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pylon_core::backoff::{
    transient_retry_delay, COURTESY_DELAY_MS, MAX_REQUEST_ATTEMPTS, TRANSIENT_RETRY_BASE,
};
use pylon_core::route_key;

use crate::bucket::{now_epoch_ms, BucketRegistry, RateLimitHeaders};
use crate::error::RestError;

/// Requests processed between bucket-pruning sweeps.
const PRUNE_EVERY: u64 = 25;

/// Scheduler configuration.
#[derive(Clone, Debug)]
pub struct RestConfig {
    /// Pre-obtained credential, attached as a bearer authorization header.
    pub token: String,
    /// Base URL prepended to every endpoint path (includes API version).
    pub base_url: String,
    /// Total execution attempts per call (initial + transient retries).
    pub max_attempts: u32,
    /// Base delay for transient-failure backoff.
    pub transient_backoff_base: Duration,
    /// Fixed delay between consecutive queued requests.
    pub courtesy_delay: Duration,
}

impl RestConfig {
    /// Config with production defaults for the given credential and base URL.
    #[must_use]
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: base_url.into(),
            max_attempts: MAX_REQUEST_ATTEMPTS,
            transient_backoff_base: TRANSIENT_RETRY_BASE,
            courtesy_delay: Duration::from_millis(COURTESY_DELAY_MS),
        }
    }
}

/// A submitted call waiting in the queue.
struct QueuedRequest {
    method: Method,
    endpoint: String,
    body: Option<Value>,
    headers: Option<HeaderMap>,
    enqueued_at: Instant,
    completion: oneshot::Sender<Result<Value, RestError>>,
}

/// Serialized, rate-limit-aware request scheduler.
///
/// Submissions resolve in strict FIFO order; the worker never starts a
/// second execution before the prior outcome is resolved. Queued requests
/// are independent of the persistent connection's liveness.
pub struct RequestScheduler {
    queue_tx: mpsc::UnboundedSender<QueuedRequest>,
    worker: JoinHandle<()>,
}

impl RequestScheduler {
    /// Spawn the worker task and return the scheduler handle.
    #[must_use]
    pub fn new(config: RestConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let client = reqwest::Client::new();
        let worker = tokio::spawn(worker_loop(client, config, queue_rx));
        Self { queue_tx, worker }
    }

    /// Submit a call and wait for its outcome.
    ///
    /// The call executes exactly once (success or terminal failure) after
    /// any rate-limit gates ahead of it clear. There is no cancellation or
    /// timeout for an individual request once submitted.
    pub async fn submit(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<Value, RestError> {
        self.submit_with_headers(method, endpoint, body, None).await
    }

    /// [`submit`](Self::submit) with extra request headers.
    pub async fn submit_with_headers(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<Value, RestError> {
        let (completion, outcome_rx) = oneshot::channel();
        self.queue_tx
            .send(QueuedRequest {
                method,
                endpoint: endpoint.to_string(),
                body,
                headers,
                enqueued_at: Instant::now(),
                completion,
            })
            .map_err(|_| RestError::QueueClosed)?;
        outcome_rx.await.map_err(|_| RestError::QueueClosed)?
    }
}

impl Drop for RequestScheduler {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Standing worker task: pops queued requests one at a time.
async fn worker_loop(
    client: reqwest::Client,
    config: RestConfig,
    mut queue_rx: mpsc::UnboundedReceiver<QueuedRequest>,
) {
    let mut buckets = BucketRegistry::new();
    let mut global_until: Option<Instant> = None;
    let mut processed: u64 = 0;

    while let Some(request) = queue_rx.recv().await {
        // Global gate: wait out an unexpired global window, then clear it.
        if let Some(until) = global_until.take() {
            let now = Instant::now();
            if until > now {
                debug!(wait_ms = (until - now).as_millis() as u64, "waiting on global rate limit");
                tokio::time::sleep_until(until.into()).await;
            }
        }

        // Route gate: wait out the bucket window for this key.
        let key = route_key(request.method.as_str(), &request.endpoint);
        if let Some(wait) = buckets.blocked_for(&key, now_epoch_ms()) {
            debug!(route = %key, wait_ms = wait.as_millis() as u64, "waiting on route bucket");
            tokio::time::sleep(wait).await;
        }

        debug!(
            route = %key,
            queued_ms = request.enqueued_at.elapsed().as_millis() as u64,
            "executing request"
        );
        let outcome = execute_with_retry(
            &client,
            &config,
            &request,
            &key,
            &mut buckets,
            &mut global_until,
        )
        .await;
        let _ = request.completion.send(outcome);

        processed += 1;
        if processed % PRUNE_EVERY == 0 {
            buckets.prune(now_epoch_ms());
        }

        // Courtesy floor between queued items, independent of bucket state.
        tokio::time::sleep(config.courtesy_delay).await;
    }
}

/// Execute one queued call, retrying rate limits and transient failures.
///
/// Rate-limit waits are unbounded in count (each wait bounded by the
/// server's stated duration) and do not consume attempts. Transient
/// network failures consume attempts with escalating backoff.
async fn execute_with_retry(
    client: &reqwest::Client,
    config: &RestConfig,
    request: &QueuedRequest,
    route: &str,
    buckets: &mut BucketRegistry,
    global_until: &mut Option<Instant>,
) -> Result<Value, RestError> {
    let mut attempt: u32 = 0;

    loop {
        let response = match send_once(client, config, request).await {
            Ok(response) => response,
            Err(err) => {
                attempt += 1;
                if attempt >= config.max_attempts {
                    warn!(route, attempts = attempt, error = %err, "transient retries exhausted");
                    return Err(RestError::Http(err));
                }
                let delay = transient_retry_delay(config.transient_backoff_base, attempt - 1);
                warn!(
                    route,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        let status = response.status();
        let rate_headers = RateLimitHeaders::parse(response.headers());
        // Headers are the sole source of truth: overwrite after every attempt.
        buckets.update(route, &rate_headers, now_epoch_ms());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let wait = rate_limit_wait(&rate_headers, &body);
            let global = rate_headers.global || body["global"] == Value::Bool(true);
            if global {
                *global_until = Some(Instant::now() + wait);
            }
            warn!(route, wait_ms = wait.as_millis() as u64, global, "rate limited");
            tokio::time::sleep(wait).await;
            continue;
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        if status.is_success() {
            let bytes = response.bytes().await.map_err(RestError::Http)?;
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(route, error = %e, "unparseable success body");
                Value::Null
            }));
        }

        // Non-success, non-rate-limited: terminal, no retry.
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["message"]
            .as_str()
            .unwrap_or("Unknown error")
            .to_string();
        return Err(RestError::Api {
            status: status.as_u16(),
            path: request.endpoint.clone(),
            message,
        });
    }
}

/// Send the HTTP call once, with auth and JSON body attached.
async fn send_once(
    client: &reqwest::Client,
    config: &RestConfig,
    request: &QueuedRequest,
) -> Result<reqwest::Response, reqwest::Error> {
    let url = format!("{}{}", config.base_url, request.endpoint);
    let mut builder = client
        .request(request.method.clone(), &url)
        .header(AUTHORIZATION, format!("Bearer {}", config.token));
    if let Some(headers) = &request.headers {
        builder = builder.headers(headers.clone());
    }
    if let Some(body) = &request.body {
        builder = builder.json(body);
    }
    builder.send().await
}

/// Wait duration for a rate-limited response: `Retry-After` header first,
/// then the body's `retry_after` field (fractional seconds).
fn rate_limit_wait(headers: &RateLimitHeaders, body: &Value) -> Duration {
    if let Some(wait) = headers.retry_after {
        return wait;
    }
    if let Some(seconds) = body["retry_after"].as_f64() {
        return Duration::from_secs_f64(seconds.max(0.0));
    }
    // Server signalled a limit without a duration; back off conservatively.
    Duration::from_secs(1)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
