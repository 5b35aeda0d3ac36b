//! REST request errors.

/// Errors surfaced to callers of [`RequestScheduler::submit`].
///
/// [`RequestScheduler::submit`]: crate::scheduler::RequestScheduler::submit
#[derive(Debug, thiserror::Error)]
pub enum RestError {
    /// Network-level failure (connect, timeout, body read). Retried with
    /// backoff before being surfaced.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success, non-rate-limited response. Terminal for the call.
    #[error("API error ({status}) on {path}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Requested endpoint path.
        path: String,
        /// Message extracted from the response body.
        message: String,
    },

    /// The scheduler worker has shut down and can no longer serve requests.
    #[error("request queue closed")]
    QueueClosed,
}

impl RestError {
    /// Whether the scheduler may retry after this error.
    ///
    /// Only network-level failures are retryable; API errors are terminal
    /// and rate-limit waits never surface as errors at all.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Api { .. } | Self::QueueClosed => false,
        }
    }
}
