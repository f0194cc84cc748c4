//! Wire types for the Airtable REST API.
//!
//! Only the fields the reconciler reads are modelled; everything else in a
//! response is ignored by serde.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column name to value, as Airtable expects it under `"fields"`.
pub type Fields = Map<String, Value>;

/// One stored row.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
}

/// Envelope of `GET /{base}/{table}`.
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub records: Vec<StoredRecord>,
    /// Present when more pages exist. Key lookups ask for a single record so
    /// this is only logged.
    #[serde(default)]
    pub offset: Option<String>,
}

/// Body of a create (`POST`) or update (`PATCH`) call.
#[derive(Debug, Serialize)]
pub struct WriteRequest {
    pub records: Vec<WriteRecord>,
    /// Lets the store coerce strings into date / select columns.
    pub typecast: bool,
}

#[derive(Debug, Serialize)]
pub struct WriteRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub fields: Fields,
}

/// Envelope returned by create and update calls.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub records: Vec<StoredRecord>,
}
