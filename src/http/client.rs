use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Response, StatusCode};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::Result;
use crate::config::HttpSettings;
use crate::error::HttpError;

use super::preview::body_preview;
use super::retry::LinearBackoff;

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub unit: Duration,
}

impl RetryPolicy {
    fn schedule(self) -> LinearBackoff {
        LinearBackoff::new(self.unit, self.max_attempts.max(1))
    }
}

/// Outbound HTTP with a fixed request timeout and a TLS verification policy.
///
/// GETs are retried on transport errors, timeouts and non-2xx statuses.
/// POSTs are sent once; callers decide what a failure means for them.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        if !settings.verify_tls {
            warn!("TLS certificate verification is disabled for outbound requests");
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(settings.timeout)
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .user_agent(concat!("alertbridge/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| HttpError::Client { source: err })?;

        Ok(Self {
            http,
            policy: RetryPolicy {
                max_attempts: settings.max_attempts,
                unit: settings.backoff_unit,
            },
        })
    }

    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// GET with bounded, linearly spaced retries.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::RetryExhausted`] wrapping the last failure once
    /// every attempt has failed.
    pub async fn get<Q>(&self, url: &str, query: &Q, headers: &HeaderMap) -> Result<Response>
    where
        Q: Serialize + ?Sized,
    {
        let mut backoff = self.policy.schedule();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let correlation_id = Uuid::now_v7().to_string();
            let started = Instant::now();
            let sent = self
                .http
                .get(url)
                .query(query)
                .headers(headers.clone())
                .header(CORRELATION_HEADER, &correlation_id)
                .send()
                .await;

            let failure = match sent {
                Ok(resp) if resp.status().is_success() => {
                    debug!(
                        url,
                        %correlation_id,
                        attempt,
                        latency_ms = started.elapsed().as_millis(),
                        "GET succeeded"
                    );
                    return Ok(resp);
                }
                Ok(resp) => status_failure(url, resp).await,
                Err(err) => HttpError::from(err),
            };

            let Some(delay) = backoff.next_backoff() else {
                return Err(HttpError::RetryExhausted {
                    url: url.to_string(),
                    attempts: attempt,
                    source: Box::new(failure),
                }
                .into());
            };
            warn!(
                url,
                %correlation_id,
                attempt,
                delay_ms = delay.as_millis(),
                error = %failure,
                "GET failed, retrying"
            );
            sleep(delay).await;
        }
    }

    /// Single-shot JSON POST. Non-2xx statuses are errors.
    ///
    /// # Errors
    ///
    /// Returns a transport or status error.
    pub async fn post_json<B>(&self, url: &str, body: &B, headers: &HeaderMap) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let request = self.http.post(url).headers(headers.clone()).json(body);
        send_once(url, request).await
    }

    /// Single-shot multipart POST. Non-2xx statuses are errors.
    ///
    /// # Errors
    ///
    /// Returns a transport or status error.
    pub async fn post_multipart(
        &self,
        url: &str,
        form: Form,
        headers: &HeaderMap,
    ) -> Result<Response> {
        let request = self.http.post(url).headers(headers.clone()).multipart(form);
        send_once(url, request).await
    }
}

async fn send_once(url: &str, request: reqwest::RequestBuilder) -> Result<Response> {
    let correlation_id = Uuid::now_v7().to_string();
    let resp = request
        .header(CORRELATION_HEADER, &correlation_id)
        .send()
        .await
        .map_err(HttpError::from)?;
    if resp.status().is_success() {
        debug!(url, %correlation_id, "POST succeeded");
        return Ok(resp);
    }
    let failure = status_failure(url, resp).await;
    warn!(url, %correlation_id, error = %failure, "POST rejected");
    Err(failure.into())
}

async fn status_failure(url: &str, resp: Response) -> HttpError {
    let status: StatusCode = resp.status();
    let body = resp.bytes().await.unwrap_or_default();
    debug!(url, %status, body = %body_preview(&body), "unsuccessful response body");
    HttpError::HttpStatus {
        status,
        url: url.to_string(),
    }
}
