//! Search request body for the people index

use bytes::Bytes;
use serde_json::{json, Map, Value};

/// Fields matched by free text, with boosts favouring surname hits
pub const SEARCH_FIELDS: [&str; 4] = ["lastName^100", "firstName^10", "country", "title"];

/// Fields returned with highlights
pub const HIGHLIGHT_FIELDS: [&str; 4] = ["lastName", "firstName", "country", "title"];

/// Maximum number of hits per response
pub const PAGE_SIZE: usize = 25;

/// Build the search body for a free-text query.
///
/// Every term must match (`operator: and`). Hits are ordered by score and
/// then by index order, and each highlighted field is returned whole.
pub fn build_search_body(q: &str) -> Value {
    let highlight_fields: Map<String, Value> = HIGHLIGHT_FIELDS
        .iter()
        .map(|field| (field.to_string(), json!({ "number_of_fragments": 0 })))
        .collect();

    json!({
        "query": {
            "multi_match": {
                "query": q,
                "fields": SEARCH_FIELDS,
                "operator": "and"
            }
        },
        "highlight": {
            "fields": highlight_fields
        },
        "size": PAGE_SIZE,
        "sort": [
            { "_score": "desc" },
            { "_doc": "asc" }
        ]
    })
}

/// Serialized form of [`build_search_body`], ready to send
pub fn search_body_bytes(q: &str) -> Bytes {
    Bytes::from(build_search_body(q).to_string())
}
