//! Rate-limited JSON fetching for provider implementations.
//!
//! Every request holds the advisory [`RateLimiter`] key `host:<hostname>`
//! and waits for the per-host token bucket before it is sent. HTTP 429 is
//! retried after the server's `Retry-After` delay, unless that delay is
//! longer than the request timeout.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Quota};
use metaforged_common::{Error, Result};
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::ratelimit::RateLimiter;

/// Envelope keys whose content replaces the whole body.
const ENVELOPE_KEYS: &[&str] = &["results", "result"];

/// Wait used when a 429 response carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: RateLimiter,
    quota: DefaultKeyedRateLimiter<String>,
    max_retries: u32,
    /// Longest `Retry-After` honoured while the host slot is held.
    max_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig, limiter: RateLimiter) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        let per_second = NonZeroU32::new(config.requests_per_second)
            .ok_or_else(|| Error::invalid_input("requests_per_second must be non-zero"))?;

        Ok(Self {
            client,
            limiter,
            quota: DefaultKeyedRateLimiter::keyed(Quota::per_second(per_second)),
            max_retries: config.max_retries,
            max_backoff: Duration::from_secs(config.timeout_secs),
        })
    }

    /// GET `url` with `params` appended as a query string and decode the JSON
    /// body.
    ///
    /// `Ok(None)` means the upstream has nothing for this request: a 404, an
    /// empty body, or a `null`/empty `results` envelope. Network failures,
    /// timeouts, other error statuses, undecodable bodies and 429s that
    /// outlast the retry budget or ask for a longer wait than the timeout are [`Error::Unavailable`].
    pub async fn get_json(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<serde_json::Value>> {
        let parsed = if params.is_empty() {
            Url::parse(url)
        } else {
            Url::parse_with_params(url, params)
        };
        let url = parsed.map_err(|e| Error::invalid_input(format!("invalid URL {url}: {e}")))?;
        let host = url.host_str().unwrap_or_default().to_string();

        let guard = self.limiter.acquire(&format!("host:{host}")).await;
        if guard.forced() {
            warn!(host = %host, "Proceeding without exclusive host slot");
        }
        let result = self.fetch(url, host).await;
        self.limiter.release(guard);
        result
    }

    async fn fetch(&self, url: Url, host: String) -> Result<Option<serde_json::Value>> {
        let mut retries = 0u32;
        loop {
            self.quota.until_key_ready(&host).await;

            debug!(url = %url, "HTTP GET");
            let resp = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| Error::unavailable(format!("request to {host} failed: {e}")))?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if retries >= self.max_retries {
                    return Err(Error::unavailable(format!(
                        "{host} still rate limited after {retries} retries"
                    )));
                }
                retries += 1;
                let wait = retry_after(&resp);
                if wait > self.max_backoff {
                    return Err(Error::unavailable(format!(
                        "{host} asked to retry after {}s",
                        wait.as_secs()
                    )));
                }
                warn!(
                    host = %host,
                    retry = retries,
                    wait_ms = wait.as_millis() as u64,
                    "Upstream returned 429, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                debug!(url = %url, "Upstream has no such resource");
                return Ok(None);
            }
            if !status.is_success() {
                return Err(Error::unavailable(format!("{host} returned {status}")));
            }

            let body = resp
                .text()
                .await
                .map_err(|e| Error::unavailable(format!("reading body from {host} failed: {e}")))?;
            return decode_body(&body);
        }
    }
}

fn retry_after(resp: &reqwest::Response) -> Duration {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

fn decode_body(body: &str) -> Result<Option<serde_json::Value>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::unavailable(format!("upstream sent invalid JSON: {e}")))?;
    Ok(unwrap_envelope(json))
}

/// Strip a `results` / `result` wrapper. `null` and empty arrays are absent.
fn unwrap_envelope(json: serde_json::Value) -> Option<serde_json::Value> {
    let inner = match json {
        serde_json::Value::Object(mut map) => {
            match ENVELOPE_KEYS.iter().find_map(|key| map.remove(*key)) {
                Some(content) => content,
                None => serde_json::Value::Object(map),
            }
        }
        other => other,
    };
    match &inner {
        serde_json::Value::Null => None,
        serde_json::Value::Array(items) if items.is_empty() => None,
        _ => Some(inner),
    }
}
