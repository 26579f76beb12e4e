//! Index bootstrap
//!
//! Resets the people index to exactly the seed records. Steps run in order
//! and the first failure aborts; records created before a failure are left
//! in place.

use bytes::Bytes;
use reqwest::StatusCode;

use crate::client::SearchBackend;
use crate::config::BootstrapSection;
use crate::people::Person;
use crate::Result;

/// Outcome of a successful bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub index: String,
    /// Whether an existing index was removed first
    pub deleted_existing: bool,
    pub documents: usize,
}

/// Delete, recreate and load the index
pub async fn bootstrap(
    backend: &dyn SearchBackend,
    config: &BootstrapSection,
    people: &[Person],
) -> Result<BootstrapReport> {
    let index = config.index.as_str();

    let deleted = backend.delete_index(index).await?;
    let deleted_existing = if deleted.status == StatusCode::NOT_FOUND
        && config.tolerate_missing_index
    {
        tracing::info!(index, "Index did not exist, nothing to delete");
        false
    } else {
        deleted.error_for_status().await?;
        tracing::info!(index, "Deleted existing index");
        true
    };

    backend.create_index(index).await?.error_for_status().await?;
    tracing::info!(index, "Created index");

    for person in people {
        let payload = Bytes::from(serde_json::to_vec(person)?);
        backend
            .create_document(index, &person.id, payload)
            .await?
            .error_for_status()
            .await?;
        tracing::debug!(index, id = %person.id, "Indexed document");
    }

    if config.refresh {
        backend.refresh(index).await?.error_for_status().await?;
    }

    let report = BootstrapReport {
        index: index.to_string(),
        deleted_existing,
        documents: people.len(),
    };
    tracing::info!(
        index,
        documents = report.documents,
        deleted_existing,
        "Bootstrap complete"
    );

    Ok(report)
}
