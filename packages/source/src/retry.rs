//! HTTP retry helpers for transient errors.
//!
//! Feed downloads go through [`send_bytes`] instead of calling
//! `reqwest::RequestBuilder::send()` directly. Timeouts, dropped
//! connections, HTTP 429 and 5xx answers are retried with exponential
//! backoff; other 4xx answers fail at once.
//!
//! ```ignore
//! let body = retry::send_bytes(|| client.get(&url)).await?;
//! ```

use std::time::Duration;

use reqwest::StatusCode;

use crate::SourceError;

/// Retries after the first attempt. Backoff is 2s, 4s, 8s, 16s, 32s.
const MAX_RETRIES: u32 = 5;

/// Full re-fetches when the body breaks off after the headers arrived.
const MAX_BODY_RETRIES: u32 = 2;

/// What to do with an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusAction {
    Accept,
    Retry,
    Reject,
}

fn status_action(status: StatusCode) -> StatusAction {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusAction::Retry
    } else if status.is_client_error() {
        StatusAction::Reject
    } else {
        StatusAction::Accept
    }
}

/// Outcome of one request attempt.
enum Attempt {
    Done(reqwest::Response),
    Retry(SourceError),
    Fail(SourceError),
}

fn classify(result: Result<reqwest::Response, reqwest::Error>) -> Attempt {
    let response = match result {
        Ok(response) => response,
        Err(e) if is_transient(&e) => return Attempt::Retry(SourceError::Http(e)),
        Err(e) => return Attempt::Fail(SourceError::Http(e)),
    };

    let status = response.status();
    let rejected = |response: &reqwest::Response| SourceError::Request {
        url: response.url().to_string(),
        message: format!("HTTP {status}"),
    };

    match status_action(status) {
        StatusAction::Accept => Attempt::Done(response),
        StatusAction::Retry => Attempt::Retry(rejected(&response)),
        StatusAction::Reject => Attempt::Fail(rejected(&response)),
    }
}

/// Wait before retry number `attempt` (1-based).
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(16))
}

/// Sends an HTTP request and returns the full response body.
///
/// `build_request` is called once per attempt because a
/// [`reqwest::RequestBuilder`] is consumed by `send()`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request still fails after all retries,
/// the server answers with a non-retryable status, or the body cannot be
/// read.
#[allow(clippy::future_not_send)]
pub async fn send_bytes<F>(build_request: F) -> Result<Vec<u8>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut body_retries = 0;

    loop {
        let response = fetch_response(&build_request).await?;
        let url = response.url().to_string();

        match response.bytes().await {
            Ok(bytes) => {
                log::debug!("{url}: {} bytes", bytes.len());
                return Ok(bytes.to_vec());
            }
            Err(e) if body_retries < MAX_BODY_RETRIES => {
                body_retries += 1;
                let delay = backoff(body_retries);
                log::warn!(
                    "{url}: body read failed ({e}), re-fetch {body_retries}/{MAX_BODY_RETRIES} in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                log::error!("{url}: body read failed after {MAX_BODY_RETRIES} re-fetches: {e}");
                return Err(SourceError::Http(e));
            }
        }
    }
}

/// Sends until a response is accepted, a permanent error occurs, or the
/// retries run out.
#[allow(clippy::future_not_send)]
async fn fetch_response<F>(build_request: &F) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut retries = 0;

    loop {
        let error = match classify(build_request().send().await) {
            Attempt::Done(response) => return Ok(response),
            Attempt::Fail(error) => return Err(error),
            Attempt::Retry(error) => error,
        };

        if retries == MAX_RETRIES {
            log::error!("giving up after {MAX_RETRIES} retries: {error}");
            return Err(error);
        }
        retries += 1;
        let delay = backoff(retries);
        log::warn!("{error}; retry {retries}/{MAX_RETRIES} in {delay:?}");
        tokio::time::sleep(delay).await;
    }
}

/// Errors worth another attempt: the request may succeed if re-sent.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_retried() {
        assert_eq!(status_action(StatusCode::TOO_MANY_REQUESTS), StatusAction::Retry);
        assert_eq!(status_action(StatusCode::BAD_GATEWAY), StatusAction::Retry);
        assert_eq!(status_action(StatusCode::SERVICE_UNAVAILABLE), StatusAction::Retry);
    }

    #[test]
    fn other_client_errors_are_permanent() {
        assert_eq!(status_action(StatusCode::NOT_FOUND), StatusAction::Reject);
        assert_eq!(status_action(StatusCode::FORBIDDEN), StatusAction::Reject);
    }

    #[test]
    fn success_and_redirects_are_accepted() {
        assert_eq!(status_action(StatusCode::OK), StatusAction::Accept);
        assert_eq!(status_action(StatusCode::NOT_MODIFIED), StatusAction::Accept);
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff(1), Duration::from_secs(2));
        assert_eq!(backoff(MAX_RETRIES), Duration::from_secs(32));
    }
}
