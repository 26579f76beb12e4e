//! Backend node pool
//!
//! Every configured Elasticsearch node is interchangeable. Requests are
//! spread across nodes round-robin, and a failed attempt moves on to the
//! next node in line.

use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::{StatusCode, Url};

use crate::{Error, Result};

/// A single backend node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Base URL, always ending in `/` so relative joins keep any path prefix
    pub url: Url,
}

impl Node {
    /// Parse a node address such as `http://es01:9200`
    pub fn parse(address: &str) -> Result<Self> {
        let mut url = Url::parse(address.trim())
            .map_err(|e| Error::invalid_address(address, e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_address(
                address,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if url.host_str().is_none() {
            return Err(Error::invalid_address(address, "missing host"));
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self { url })
    }

    /// Build the URL for an API path relative to this node
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::invalid_address(self.url.as_str(), e.to_string()))
    }
}

/// Round-robin pool over all configured nodes
#[derive(Debug)]
pub struct NodePool {
    nodes: Vec<Node>,
    cursor: AtomicUsize,
}

impl NodePool {
    /// Create a pool from an ordered list of addresses
    pub fn new<S: AsRef<str>>(addresses: &[S]) -> Result<Self> {
        if addresses.is_empty() {
            return Err(Error::NoNodes);
        }

        let nodes = addresses
            .iter()
            .map(|addr| Node::parse(addr.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            nodes,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Pick the next node in round-robin order
    pub fn next(&self) -> &Node {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.nodes.len();
        &self.nodes[idx]
    }

    /// Nodes in configured order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

/// Gateway statuses that mean "try another node"
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}
