//! Transport for the answer endpoint.
//!
//! [`QueryTransport`] opens one request and hands back the raw body as a
//! stream of byte chunks. [`HttpTransport`] is the production implementation;
//! [`MockTransport`] scripts replies for tests.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{Result, TransportError};
use crate::query::Query;

/// Raw response body, chunked as it arrives from the network.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Trait for opening an answer stream.
///
/// This trait abstracts the HTTP client, allowing the supervisor to be driven
/// by scripted streams in tests.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Submit `query` and return the response body once the endpoint accepted it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent or the endpoint answers
    /// with anything other than `200 OK`.
    async fn open(&self, query: &Query) -> Result<ByteStream>;
}

/// Request body for the answer endpoint.
#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

/// HTTP transport posting queries with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_token: Option<String>,
}

impl HttpTransport {
    /// Create a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self::with_client(client, config))
    }

    /// Create a transport with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            url: config.endpoint_url(),
            api_token: config.api_token.clone(),
        }
    }

    /// Get the endpoint URL queries are posted to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn open(&self, query: &Query) -> Result<ByteStream> {
        let mut request = self
            .client
            .post(&self.url)
            .header(ACCEPT, "text/event-stream")
            .json(&QueryRequest {
                query: query.as_str(),
            });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        tracing::debug!(url = %self.url, "Answer stream accepted");

        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| TransportError::Body(e.to_string()))
        });
        Ok(body.boxed())
    }
}

/// A scripted reply for [`MockTransport`].
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub enum MockReply {
    /// Accept the request; the body yields whatever is sent on the channel
    /// and ends when the sender is dropped.
    Stream(tokio::sync::mpsc::UnboundedReceiver<Result<Vec<u8>>>),
    /// Reject the request.
    Fail(TransportError),
}

/// Transport that replays scripted replies in order.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: parking_lot::Mutex<std::collections::VecDeque<MockReply>>,
    queries: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockTransport {
    /// Create a transport with no scripted replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script an accepted request and return the sender feeding its body.
    pub fn push_stream(&self) -> tokio::sync::mpsc::UnboundedSender<Result<Vec<u8>>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.replies.lock().push_back(MockReply::Stream(rx));
        tx
    }

    /// Script a rejected request.
    pub fn push_failure(&self, error: TransportError) {
        self.replies.lock().push_back(MockReply::Fail(error));
    }

    /// Queries received so far, in order.
    #[must_use]
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    /// Number of requests opened.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.queries.lock().len()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl QueryTransport for MockTransport {
    async fn open(&self, query: &Query) -> Result<ByteStream> {
        self.queries.lock().push(query.to_string());
        let reply = self.replies.lock().pop_front();

        match reply {
            Some(MockReply::Stream(rx)) => Ok(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            Some(MockReply::Fail(error)) => Err(error),
            None => Err(TransportError::Body("no scripted reply".to_string())),
        }
    }
}
