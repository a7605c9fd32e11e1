use std::{error::Error as StdError, future::Future, time::Duration};

use reqwest::{StatusCode, header::HeaderMap};
use thiserror::Error;
use tokio_stream::StreamExt;
use tracing::{debug, instrument};

/// One bounded GET request
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub headers: HeaderMap,
    /// Budget covering connect, response headers and the prefix read
    pub timeout: Duration,
    pub max_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// At most `max_bytes` of the body. Only read for `200 OK` responses.
    pub body_prefix: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Whether the failure means the host could not be reached in time, as opposed to a broken request
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connect(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let message = error_chain(&e);
        if e.is_timeout() {
            Self::Timeout(message)
        } else if e.is_connect() {
            Self::Connect(message)
        } else {
            Self::Request(message)
        }
    }
}

fn error_chain(e: &(dyn StdError + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// HTTP transport used by the probe engine
pub trait Fetch: Send + Sync + 'static {
    fn fetch(
        &self,
        request: FetchRequest<'_>,
    ) -> impl Future<Output = Result<FetchResponse, TransportError>> + Send;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetch for ReqwestFetcher {
    #[instrument(skip_all, fields(url = request.url))]
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchResponse, TransportError> {
        let res = self
            .client
            .get(request.url)
            .headers(request.headers)
            .timeout(request.timeout)
            .send()
            .await?;

        let status = res.status();
        let headers = res.headers().clone();
        if status != StatusCode::OK {
            return Ok(FetchResponse {
                status: status.as_u16(),
                headers,
                body_prefix: Vec::new(),
            });
        }

        let mut body_prefix = Vec::with_capacity(request.max_bytes);
        let mut stream = res.bytes_stream();
        while body_prefix.len() < request.max_bytes {
            let Some(chunk) = stream.next().await else {
                break;
            };
            let chunk = chunk?;
            let take = chunk.len().min(request.max_bytes - body_prefix.len());
            body_prefix.extend_from_slice(&chunk[..take]);
        }
        debug!("Read {} body bytes", body_prefix.len());

        Ok(FetchResponse {
            status: status.as_u16(),
            headers,
            body_prefix,
        })
    }
}
