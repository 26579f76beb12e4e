//! people-search - a small HTTP front-end over an Elasticsearch cluster
//!
//! On startup the `people` index is reset to a fixed set of records. After
//! that the service answers two routes:
//! - `GET /` passes through the cluster info document
//! - `GET /search?q=...` runs a weighted multi-field search and passes
//!   through the raw search response

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod people;
pub mod query;
pub mod server;
pub mod shutdown;

pub use error::{Error, Result};
