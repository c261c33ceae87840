//! Page transport.
//!
//! The pagination driver only needs "fetch this URL, give me the bytes".
//! [`Transport`] is that seam; [`HttpTransport`] implements it with a
//! blocking `reqwest` client, and tests substitute scripted transports.

use std::time::Duration;

use anyhow::Result;

use crate::config::SourceConfig;
use crate::error::TransportError;

/// Blocking fetch of a single URL.
pub trait Transport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        (**self).fetch(url)
    }
}

/// HTTP GET transport with optional retries.
///
/// Retries apply to connection failures, `429` and `5xx` answers, with
/// exponential backoff (1s, 2s, 4s, ...). Other client errors fail at once.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    fn fetch_once(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let request_err = |source| TransportError::Request {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().map_err(request_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().map_err(request_err)?;
        Ok(body.to_vec())
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url) {
                Ok(body) => return Ok(body),
                Err(err) if attempt < self.max_retries && is_retryable(&err) => {
                    attempt += 1;
                    // Exponential backoff: 1s, 2s, 4s, 8s, ...
                    let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                    tracing::debug!(url, attempt, error = %err, "retrying fetch in {:?}", delay);
                    std::thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn is_retryable(err: &TransportError) -> bool {
    match err {
        TransportError::Request { .. } => true,
        TransportError::Status { status, .. } => *status == 429 || *status >= 500,
    }
}

/// URL of listing page `page`: `<listing_url>?<param>=<page>`.
pub fn page_url(listing_url: &str, page_param: &str, page: u32) -> String {
    format!("{}?{}={}", listing_url, page_param, page)
}
