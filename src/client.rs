//! Elasticsearch client
//!
//! A thin HTTP client over the handful of Elasticsearch APIs this service
//! needs. Responses are handed back unparsed with their body as a byte
//! stream, so callers can pipe them straight to their own clients.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};

use crate::cluster::{is_retryable_status, NodePool};
use crate::config::BackendSection;
use crate::{Error, Result};

/// Byte stream of an upstream response body
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Raw backend response
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: BodyStream,
}

impl BackendResponse {
    /// Build a response from an in-memory body
    pub fn from_bytes(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            content_type: Some(HeaderValue::from_static("application/json")),
            body: Box::pin(futures::stream::once(async move { Ok::<_, Error>(body) })),
        }
    }

    /// Collect the whole body into memory
    pub async fn into_bytes(self) -> Result<Bytes> {
        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        Ok(chunks.concat().into())
    }

    /// Turn a non-2xx answer into `Error::Backend`, keeping the body text
    pub async fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }

        let status = self.status;
        let body = match self.into_bytes().await {
            Ok(body) => String::from_utf8_lossy(&body).into_owned(),
            Err(err) => {
                tracing::warn!(%status, error = %err, "Failed to read backend error body");
                format!("<unreadable body: {}>", err)
            }
        };
        Err(Error::Backend { status, body })
    }
}

impl std::fmt::Debug for BackendResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Search backend operations
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Cluster info document (`GET /`)
    async fn info(&self) -> Result<BackendResponse>;

    /// Run a search request body against an index
    async fn search(
        &self,
        index: &str,
        body: Bytes,
        track_total_hits: bool,
    ) -> Result<BackendResponse>;

    /// Delete an index
    async fn delete_index(&self, index: &str) -> Result<BackendResponse>;

    /// Create an index, letting the engine infer mappings
    async fn create_index(&self, index: &str) -> Result<BackendResponse>;

    /// Create a document under an explicit id; fails if the id exists
    async fn create_document(&self, index: &str, id: &str, body: Bytes)
        -> Result<BackendResponse>;

    /// Make recent writes visible to search
    async fn refresh(&self, index: &str) -> Result<BackendResponse>;
}

/// `reqwest` based Elasticsearch client
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http: reqwest::Client,
    pool: Arc<NodePool>,
    max_retries: usize,
}

impl ElasticClient {
    /// Create a client for the configured addresses
    pub fn new(config: &BackendSection) -> Result<Self> {
        let pool = NodePool::new(&config.addresses)?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("people-search/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http: builder.build()?,
            pool: Arc::new(pool),
            max_retries: config.max_retries,
        })
    }

    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    /// Send a request, moving to the next node on transport errors and
    /// gateway statuses until the retry budget is spent.
    async fn perform(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Bytes>,
    ) -> Result<BackendResponse> {
        let mut attempt = 0;

        loop {
            let node = self.pool.next();
            let url = node.endpoint(path)?;

            let mut request = self.http.request(method.clone(), url.clone());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = &body {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
            }

            let retries_left = attempt < self.max_retries;
            match request.send().await {
                Ok(response) if retries_left && is_retryable_status(response.status()) => {
                    tracing::warn!(
                        %url,
                        status = %response.status(),
                        attempt,
                        "Backend node unavailable, retrying on next node"
                    );
                }
                Ok(response) => {
                    tracing::debug!(%method, %url, status = %response.status(), "Backend responded");
                    return Ok(into_backend_response(response));
                }
                Err(err) if retries_left && (err.is_connect() || err.is_timeout()) => {
                    tracing::warn!(%url, error = %err, attempt, "Backend request failed, retrying on next node");
                }
                Err(err) => return Err(err.into()),
            }

            attempt += 1;
        }
    }
}

fn into_backend_response(response: reqwest::Response) -> BackendResponse {
    let status = response.status();
    let content_type = response.headers().get(CONTENT_TYPE).cloned();
    let body = response.bytes_stream().map_err(Error::from);

    BackendResponse {
        status,
        content_type,
        body: Box::pin(body),
    }
}

#[async_trait]
impl SearchBackend for ElasticClient {
    async fn info(&self) -> Result<BackendResponse> {
        self.perform(Method::GET, "/", &[], None).await
    }

    async fn search(
        &self,
        index: &str,
        body: Bytes,
        track_total_hits: bool,
    ) -> Result<BackendResponse> {
        let query: &[(&str, &str)] = if track_total_hits {
            &[("track_total_hits", "true")]
        } else {
            &[]
        };
        self.perform(Method::POST, &format!("{}/_search", index), query, Some(body))
            .await
    }

    async fn delete_index(&self, index: &str) -> Result<BackendResponse> {
        self.perform(Method::DELETE, index, &[], None).await
    }

    async fn create_index(&self, index: &str) -> Result<BackendResponse> {
        self.perform(Method::PUT, index, &[], None).await
    }

    async fn create_document(
        &self,
        index: &str,
        id: &str,
        body: Bytes,
    ) -> Result<BackendResponse> {
        self.perform(
            Method::PUT,
            &format!("{}/_create/{}", index, id),
            &[],
            Some(body),
        )
        .await
    }

    async fn refresh(&self, index: &str) -> Result<BackendResponse> {
        self.perform(Method::POST, &format!("{}/_refresh", index), &[], None)
            .await
    }
}
