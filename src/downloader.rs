use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outgoing HTTP GET. Non-2xx statuses are returned as responses, not errors.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchError>;
}

#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(user_agent: &str) -> reqwest::Result<Self> {
        Ok(Self {
            client: Self::build_http_client(user_agent)?,
        })
    }

    fn build_http_client(user_agent: &str) -> reqwest::Result<Client> {
        ClientBuilder::new()
            .use_rustls_tls()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(10))
            .build()
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse, FetchError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Transport(e.to_string())
            }
        };

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(map_err)?.to_vec();

        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Attempt bounds for a single URL.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// GETs `url` until it yields a non-empty 2xx body, at most
/// `1 + max_retries` times, sleeping `backoff` between attempts.
pub async fn fetch_with_retry(
    fetcher: &dyn HttpFetcher,
    url: &str,
    policy: RetryPolicy,
) -> Result<FetchResponse, FetchError> {
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, fetcher.get(url, policy.timeout)).await {
            Err(_) => Err(FetchError::Timeout(policy.timeout)),
            Ok(Err(e)) => Err(e),
            Ok(Ok(response)) if !response.is_success() => Err(FetchError::Status(response.status)),
            Ok(Ok(response)) if response.body.is_empty() => Err(FetchError::EmptyBody),
            Ok(Ok(response)) => Ok(response),
        };

        match outcome {
            Ok(response) => {
                debug!(url, attempt, "fetched");
                return Ok(response);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                debug!(url, attempt, error = %e, "fetch failed, retrying");
                tokio::time::sleep(policy.backoff).await;
            }
            Err(e) => {
                warn!(url, attempts = attempt + 1, error = %e, "giving up on fetch");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    struct Sequence {
        responses: Mutex<VecDeque<Result<FetchResponse, FetchError>>>,
        calls: Mutex<u32>,
    }

    impl Sequence {
        fn new(responses: Vec<Result<FetchResponse, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl HttpFetcher for Sequence {
        async fn get(&self, _url: &str, _timeout: Duration) -> Result<FetchResponse, FetchError> {
            *self.calls.lock() += 1;
            self.responses
                .lock()
                .pop_front()
                .unwrap_or(Err(FetchError::Transport("exhausted".into())))
        }
    }

    fn status(code: u16, body: &[u8]) -> Result<FetchResponse, FetchError> {
        Ok(FetchResponse {
            status: code,
            content_type: None,
            body: body.to_vec(),
        })
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let fetcher = Sequence::new(vec![status(503, b""), status(503, b""), status(200, b"ok")]);
        let response = fetch_with_retry(&fetcher, "https://example.com/a.css", policy())
            .await
            .unwrap();
        assert_eq!(response.body, b"ok");
        assert_eq!(*fetcher.calls.lock(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_two_retries() {
        let fetcher = Sequence::new(vec![
            Err(FetchError::Transport("reset".into())),
            status(500, b""),
            status(502, b""),
            status(200, b"too late"),
        ]);
        let err = fetch_with_retry(&fetcher, "https://example.com/a.css", policy())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(502)));
        assert_eq!(*fetcher.calls.lock(), 3);
    }

    #[tokio::test]
    async fn test_empty_body_is_not_retried() {
        let fetcher = Sequence::new(vec![status(200, b""), status(200, b"full")]);
        let err = fetch_with_retry(&fetcher, "https://example.com/a.css", policy())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyBody));
        assert_eq!(*fetcher.calls.lock(), 1);
    }
}
