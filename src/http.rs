// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// Connect and read timeout for episode transfers
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);

/// Whole-request timeout for feed fetches unless configured otherwise
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(60);

/// Extra request headers, as configured per feed
pub type Headers = BTreeMap<String, String>;

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// HTTP response with status, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

/// Fully buffered HTTP response, used for feeds
pub struct BytesResponse {
    pub status: u16,
    pub body: Bytes,
}

/// HTTP client abstraction for testability
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Fetch the entire response body as bytes
    async fn get_bytes(&self, url: &str, headers: &Headers)
    -> Result<BytesResponse, reqwest::Error>;

    /// Get a streaming response for large downloads
    async fn get_stream(&self, url: &str, headers: &Headers)
    -> Result<HttpResponse, reqwest::Error>;
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    feed_timeout: Duration,
}

impl ReqwestClient {
    /// Create a new ReqwestClient with default timeouts
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_feed_timeout(DEFAULT_FEED_TIMEOUT)
    }

    /// Create a new ReqwestClient whose feed requests give up after `feed_timeout`
    pub fn with_feed_timeout(feed_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(TRANSFER_TIMEOUT)
            .read_timeout(TRANSFER_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            feed_timeout,
        })
    }

    fn request(&self, url: &str, headers: &Headers) -> reqwest::RequestBuilder {
        headers
            .iter()
            .fold(self.client.get(url), |request, (name, value)| {
                request.header(name.as_str(), value.as_str())
            })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_bytes(
        &self,
        url: &str,
        headers: &Headers,
    ) -> Result<BytesResponse, reqwest::Error> {
        let response = self
            .request(url, headers)
            .timeout(self.feed_timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(BytesResponse { status, body })
    }

    async fn get_stream(
        &self,
        url: &str,
        headers: &Headers,
    ) -> Result<HttpResponse, reqwest::Error> {
        let response = self.request(url, headers).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();

        let body: ByteStream = Box::pin(response.bytes_stream());

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}
