//! Airtable record store and the upsert reconciler that writes into it.

pub mod client;
pub mod error;
pub mod reconcile;
pub(crate) mod retry;
pub mod store;
pub mod types;

pub use client::AirtableClient;
pub use error::StoreError;
pub use reconcile::{upsert_records, UpsertSummary, BATCH_SIZE};
pub use store::RecordStore;
